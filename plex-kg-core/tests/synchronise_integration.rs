use std::fs;
use std::path::{Path, PathBuf};

use mockall::predicate::eq;
use oxrdf::Graph;
use plex_kg_core::config::PipelineConfig;
use plex_kg_core::contract::{GraphName, MockMediaServer, MockTripleStore};
use plex_kg_core::rdf::parse_turtle;
use plex_kg_core::synchronise::{
    build_artifact, recommend, run_named_query, Publisher, RecommendationKind, SynchroniseOutcome,
};
use plex_kg_core::Error;
use serde_json::json;
use tempfile::tempdir;

fn repo_rdf_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../rdf")
}

fn config_with_rdf(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        rdf_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn media_server() -> MockMediaServer {
    let mut server = MockMediaServer::new();
    server.expect_section_items().with(eq(1)).returning(|_| {
        Ok(json!({
            "MediaContainer": {"Metadata": [{
                "slug": "dune",
                "type": "movie",
                "title": "Dune",
                "rating": 8.0,
                "Genre": [{"tag": "Sci-Fi"}],
                "Director": [{"tag": "Denis Villeneuve"}]
            }]}
        }))
    });
    server
        .expect_playback_history()
        .with(eq(1), eq(1))
        .returning(|_, _| {
            Ok(json!({
                "MediaContainer": {"Metadata": [
                    {"historyKey": "/status/sessions/history/9", "title": "Dune", "viewedAt": 1672628645}
                ]}
            }))
        });
    server
}

/// An rdf directory whose only shape demands a publication date on every movie.
fn strict_rdf_dir(root: &Path) {
    fs::create_dir_all(root.join("shapes")).unwrap();
    fs::write(
        root.join("shapes/default.ttl"),
        r#"
        @prefix sh: <http://www.w3.org/ns/shacl#> .
        @prefix schema: <https://schema.org/> .
        [] a sh:NodeShape ;
            sh:targetClass schema:Movie ;
            sh:property [ sh:path schema:datePublished ; sh:minCount 1 ] .
        "#,
    )
    .unwrap();
}

#[tokio::test]
async fn test_build_artifact_returns_data_graph_when_valid() {
    let server = media_server();
    let config = config_with_rdf(&repo_rdf_dir());

    let artifact = build_artifact(&server, &config, 1, 1).await.unwrap();

    assert_eq!(artifact.status, 200);
    assert_eq!(artifact.filename, "data.ttl");
    let graph = parse_turtle(&artifact.content, None).unwrap();
    assert!(!graph.is_empty());
}

#[tokio::test]
async fn test_build_artifact_returns_report_when_invalid() {
    let dir = tempdir().unwrap();
    strict_rdf_dir(dir.path());
    let server = media_server();
    let config = config_with_rdf(dir.path());

    let artifact = build_artifact(&server, &config, 1, 1).await.unwrap();

    assert_eq!(artifact.status, 400);
    assert_eq!(artifact.filename, "error_report.ttl");
    assert!(artifact.content.contains("MinCountConstraintComponent"));
}

#[tokio::test]
async fn test_publish_uploads_derives_and_revalidates() {
    let server = media_server();
    let publisher = Publisher::new(config_with_rdf(&repo_rdf_dir()));

    let mut store = MockTripleStore::new();
    let mut seq = mockall::Sequence::new();
    store
        .expect_replace_graph()
        .withf(|graph, turtle| *graph == GraphName::Default && turtle.contains("Dune"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(json!({"count": 20, "tripleCount": 20, "quadCount": 0})));
    store
        .expect_replace_graph()
        .withf(|graph, turtle| {
            *graph == GraphName::named("ontology") && turtle.contains("rdfs:Class")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(json!({"count": 50, "tripleCount": 50, "quadCount": 0})));
    store
        .expect_run_update()
        .withf(|update| update.contains("INSERT"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    store
        .expect_fetch_graph()
        .times(2)
        .returning(|_| Ok(Graph::new()));

    let outcome = publisher.synchronise(&server, &store, 1, 1).await.unwrap();

    match outcome {
        SynchroniseOutcome::Published(report) => {
            assert_eq!(report.data["count"], 20);
            assert_eq!(report.ontology["count"], 50);
            assert_eq!(report.relationships, "Successfully built.");
            assert!(report.triples > 0);
        }
        SynchroniseOutcome::Rejected(artifact) => panic!("unexpected rejection: {}", artifact.content),
    }
}

#[tokio::test]
async fn test_publish_uploads_nothing_when_local_validation_fails() {
    let dir = tempdir().unwrap();
    strict_rdf_dir(dir.path());
    let server = media_server();
    let publisher = Publisher::new(config_with_rdf(dir.path()));

    let mut store = MockTripleStore::new();
    store.expect_replace_graph().never();
    store.expect_run_update().never();
    store.expect_fetch_graph().never();

    let outcome = publisher.synchronise(&server, &store, 1, 1).await.unwrap();
    match outcome {
        SynchroniseOutcome::Rejected(artifact) => assert_eq!(artifact.status, 400),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_publish_rejects_invalid_relations_graph() {
    let server = media_server();
    let publisher = Publisher::new(config_with_rdf(&repo_rdf_dir()));

    let mut store = MockTripleStore::new();
    store
        .expect_replace_graph()
        .times(2)
        .returning(|_, _| Ok(json!({})));
    store.expect_run_update().times(1).returning(|_| Ok(()));
    store
        .expect_fetch_graph()
        .with(eq(GraphName::Default))
        .returning(|_| Ok(Graph::new()));
    store
        .expect_fetch_graph()
        .with(eq(GraphName::named("relations")))
        .returning(|_| {
            parse_turtle(
                "<http://plex-kg/person/someone> <https://schema.org/knowsAbout> <http://plex-kg/genre/unknown> .",
                None,
            )
        });

    let outcome = publisher.synchronise(&server, &store, 1, 1).await.unwrap();
    match outcome {
        SynchroniseOutcome::Rejected(artifact) => {
            assert_eq!(artifact.status, 400);
            assert_eq!(artifact.filename, "error_report.ttl");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_publish_stops_on_store_error() {
    let server = media_server();
    let publisher = Publisher::new(config_with_rdf(&repo_rdf_dir()));

    let mut store = MockTripleStore::new();
    store
        .expect_replace_graph()
        .times(1)
        .returning(|_, _| Err(Error::upstream("fuseki", 401, "Unauthorized")));
    store.expect_run_update().never();
    store.expect_fetch_graph().never();

    let err = publisher
        .synchronise(&server, &store, 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 401, .. }));
}

#[tokio::test]
async fn test_named_queries_read_the_query_file() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("queries")).unwrap();
    fs::write(
        dir.path().join("queries/recommend_movies.rq"),
        "SELECT ?movie WHERE { ?movie a <https://schema.org/Movie> }",
    )
    .unwrap();
    let files = config_with_rdf(dir.path()).rdf_files();

    let mut store = MockTripleStore::new();
    store
        .expect_run_query()
        .withf(|query| query.starts_with("SELECT ?movie"))
        .times(1)
        .returning(|_| Ok(json!({"results": {"bindings": []}})));

    let result = recommend(&store, &files, RecommendationKind::Movies)
        .await
        .unwrap();
    assert_eq!(result["results"]["bindings"], json!([]));

    let err = run_named_query(&store, &files, "../secrets").await.unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
    let err = run_named_query(&store, &files, "missing").await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

fn show_server() -> MockMediaServer {
    let mut server = MockMediaServer::new();
    server.expect_section_items().returning(|_| {
        Ok(json!({
            "MediaContainer": {"Metadata": [
                {"slug": "dune", "type": "movie", "title": "Dune"},
                {"type": "show", "title": "???"}
            ]}
        }))
    });
    server
        .expect_playback_history()
        .returning(|_, _| Ok(json!({"MediaContainer": {}})));
    server
}

#[tokio::test]
async fn test_build_artifact_fails_on_non_movie_item() {
    let server = show_server();
    let config = config_with_rdf(&repo_rdf_dir());

    let err = build_artifact(&server, &config, 1, 1).await.unwrap_err();
    assert!(matches!(err, Error::WrongMediaType { ref found, .. } if found == "show"));
}

#[tokio::test]
async fn test_publish_uploads_nothing_for_non_movie_item() {
    let server = show_server();
    let publisher = Publisher::new(config_with_rdf(&repo_rdf_dir()));

    let mut store = MockTripleStore::new();
    store.expect_replace_graph().never();
    store.expect_run_update().never();
    store.expect_fetch_graph().never();

    let err = publisher
        .synchronise(&server, &store, 1, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WrongMediaType { .. }));
}
