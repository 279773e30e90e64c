use mockito::Matcher;
use plex_kg::fuseki::{FusekiClient, StoreSettings};
use plex_kg_core::contract::{GraphName, TripleStore};
use plex_kg_core::Error;
use serde_json::json;
use serial_test::serial;

const GRAPH_BASE: &str = "http://plex-kg/";
// base64("admin:pw")
const AUTH: &str = "Basic YWRtaW46cHc=";

fn client(base_url: String) -> FusekiClient {
    let settings = StoreSettings {
        base_url,
        ..Default::default()
    };
    FusekiClient::new(&settings, GRAPH_BASE, "admin", "pw").unwrap()
}

#[test]
fn graph_iri_resolves_named_graphs_only() {
    let client = client("http://localhost:3030/plex".to_string());
    assert_eq!(client.graph_iri(&GraphName::Default), None);
    assert_eq!(
        client.graph_iri(&GraphName::named("relations")).as_deref(),
        Some("http://plex-kg/relations")
    );
}

#[tokio::test]
async fn replace_default_graph_puts_turtle() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/data")
        .match_header("authorization", AUTH)
        .match_header("content-type", "text/turtle")
        .match_body("<http://a> <http://b> <http://c> .\n")
        .with_status(200)
        .with_body(r#"{"count": 1, "tripleCount": 1, "quadCount": 0}"#)
        .create_async()
        .await;

    let ack = client(server.url())
        .replace_graph(&GraphName::Default, "<http://a> <http://b> <http://c> .\n")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(ack["tripleCount"], 1);
}

#[tokio::test]
async fn replace_named_graph_passes_graph_iri() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/data")
        .match_query(Matcher::UrlEncoded(
            "graph".into(),
            "http://plex-kg/ontology".into(),
        ))
        .with_status(201)
        .create_async()
        .await;

    let ack = client(server.url())
        .replace_graph(&GraphName::named("ontology"), "")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(ack, serde_json::Value::Null);
}

#[tokio::test]
async fn fetch_graph_parses_turtle() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/data")
        .match_query(Matcher::UrlEncoded("graph".into(), "default".into()))
        .match_header("accept", "text/turtle")
        .match_header("authorization", AUTH)
        .with_status(200)
        .with_header("content-type", "text/turtle")
        .with_body(
            "@prefix schema: <https://schema.org/> .\n\
             <http://plex-kg/movie/dune> a schema:Movie ; schema:name \"Dune\" .\n",
        )
        .create_async()
        .await;

    let graph = client(server.url())
        .fetch_graph(&GraphName::Default)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(graph.len(), 2);
}

#[tokio::test]
async fn run_query_posts_form_and_returns_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/query")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Regex("^query=SELECT".to_string()))
        .with_status(200)
        .with_header("content-type", "application/sparql-results+json")
        .with_body(json!({"head": {"vars": ["s"]}, "results": {"bindings": []}}).to_string())
        .create_async()
        .await;

    let results = client(server.url())
        .run_query("SELECT ?s WHERE { ?s ?p ?o }")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(results["head"]["vars"][0], "s");
}

#[tokio::test]
async fn run_update_sends_sparql_update() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/update")
        .match_header("content-type", "application/sparql-update")
        .match_header("authorization", AUTH)
        .match_body("DROP SILENT GRAPH <http://plex-kg/relations>")
        .with_status(204)
        .create_async()
        .await;

    client(server.url())
        .run_update("DROP SILENT GRAPH <http://plex-kg/relations>")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_surfaces_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/update")
        .with_status(400)
        .with_body("Parse error: line 1")
        .create_async()
        .await;

    let err = client(server.url()).run_update("NOT SPARQL").await.unwrap_err();

    match err {
        Error::Upstream {
            service,
            status,
            body,
        } => {
            assert_eq!(service, "fuseki");
            assert_eq!(status, 400);
            assert_eq!(body, "Parse error: line 1");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[test]
#[serial]
fn new_from_env_requires_credentials() {
    std::env::remove_var("FUSEKI_USER");
    std::env::set_var("FUSEKI_PASSWORD", "pw");
    let result = FusekiClient::new_from_env(&StoreSettings::default(), GRAPH_BASE);
    std::env::remove_var("FUSEKI_PASSWORD");
    assert!(matches!(result, Err(Error::Config(_))));
}
