use plex_kg_core::contract::MockMediaServer;
use plex_kg_core::extract::{
    create_structured_datasets, structure_datasets, DedupTable, Genre, Person, Tag,
};
use plex_kg_core::Error;
use serde_json::json;

fn section_payload() -> serde_json::Value {
    json!({
        "MediaContainer": {
            "size": 3,
            "Metadata": [
                {
                    "slug": "dune",
                    "type": "movie",
                    "title": "Dune",
                    "rating": 8.05,
                    "originallyAvailableAt": "2021-10-22",
                    "duration": 9360000,
                    "librarySectionTitle": "Movies",
                    "Genre": [{"tag": "Sci-Fi"}, {"tag": "Adventure"}],
                    "Director": [{"tag": "Denis Villeneuve"}],
                    "Writer": [{"tag": "Denis Villeneuve"}, {"tag": "Jon Spaihts"}],
                    "Role": [{"tag": "Timothée Chalamet", "role": "Paul Atreides"}]
                },
                {
                    "type": "movie",
                    "title": "Blade Runner 2049",
                    "Genre": [{"tag": "sci-fi!"}],
                    "Director": [{"tag": "Denis Villeneuve"}],
                    "Role": null
                },
                {
                    "type": "movie",
                    "title": "!!!"
                }
            ]
        }
    })
}

fn history_payload() -> serde_json::Value {
    json!({
        "MediaContainer": {
            "Metadata": [
                {"historyKey": "/status/sessions/history/1", "title": "Dune", "viewedAt": 1672628645, "type": "movie"},
                {"historyKey": "/status/sessions/history/2", "title": "Arrival", "viewedAt": 1672628700}
            ]
        }
    })
}

#[test]
fn test_colliding_genre_names_merge_into_one_entity() {
    let table: DedupTable<Genre> = DedupTable::from_names(["Action", "Sci-Fi", "sci-fi!"]);

    let slugs: Vec<&str> = table.iter().map(|g| g.slug.as_str()).collect();
    assert_eq!(slugs, vec!["action", "sci-fi"]);
    assert_eq!(table.slug_for("Sci-Fi"), Some("sci-fi"));
    assert_eq!(table.slug_for("sci-fi!"), Some("sci-fi"));

    let sci_fi = &table.entries()[1];
    assert_eq!(sci_fi.name, "Sci-Fi");
    assert_eq!(sci_fi.aliases, vec!["sci-fi!".to_string()]);
}

#[test]
fn test_unknown_tags_are_dropped_silently() {
    let table: DedupTable<Person> = DedupTable::from_names(["Denis Villeneuve"]);
    let slugs = table.map_tags(&[
        Tag::new("Denis Villeneuve"),
        Tag::new("Nobody"),
        Tag::new("Denis Villeneuve"),
    ]);
    assert_eq!(slugs, vec!["denis-villeneuve".to_string()]);
}

#[test]
fn test_punctuation_only_names_produce_no_entity() {
    let table: DedupTable<Genre> = DedupTable::from_names(["???", "Drama"]);
    assert_eq!(table.len(), 1);
    assert!(table.contains_slug("drama"));
    assert_eq!(table.slug_for("???"), None);
}

#[test]
fn test_structure_datasets_reshapes_section_and_history() {
    let datasets = structure_datasets(section_payload(), history_payload()).unwrap();

    // "!!!" has no usable slug and is dropped.
    assert_eq!(datasets.movies.len(), 2);
    let dune = &datasets.movies[0];
    assert_eq!(dune.slug, "dune");
    assert_eq!(dune.genres, vec!["sci-fi", "adventure"]);
    assert_eq!(dune.directors, vec!["denis-villeneuve"]);
    assert_eq!(dune.writers, vec!["denis-villeneuve", "jon-spaihts"]);
    assert_eq!(dune.actors, vec!["timoth-e-chalamet"]);
    assert_eq!(dune.rating, Some(8.05));
    assert_eq!(dune.duration, Some(9360000));

    let blade_runner = &datasets.movies[1];
    assert_eq!(blade_runner.slug, "blade-runner-2049");
    assert_eq!(blade_runner.genres, vec!["sci-fi"]);
    assert!(blade_runner.actors.is_empty());

    // Persons are the union of directors, writers and actors.
    let persons: Vec<&str> = datasets.persons.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(
        persons,
        vec!["denis-villeneuve", "jon-spaihts", "timoth-e-chalamet"]
    );

    // Every relationship slug resolves in its table.
    for movie in &datasets.movies {
        assert!(movie.genres.iter().all(|s| datasets.genres.contains_slug(s)));
        assert!(movie
            .directors
            .iter()
            .chain(&movie.writers)
            .chain(&movie.actors)
            .all(|s| datasets.persons.contains_slug(s)));
    }

    // "Arrival" is not in the section.
    assert_eq!(datasets.history.len(), 1);
    assert_eq!(datasets.history[0].movie_slug, "dune");
    assert_eq!(
        datasets.history[0].viewed_at.to_rfc3339(),
        "2023-01-02T03:04:05+00:00"
    );
}

#[test]
fn test_repeated_movie_slugs_get_a_suffix() {
    let section = json!({
        "MediaContainer": {"Metadata": [
            {"type": "movie", "title": "Solaris"},
            {"type": "movie", "title": "Solaris"}
        ]}
    });
    let history = json!({"MediaContainer": {}});
    let datasets = structure_datasets(section, history).unwrap();
    let slugs: Vec<&str> = datasets.movies.iter().map(|m| m.slug.as_str()).collect();
    assert_eq!(slugs, vec!["solaris", "solaris-2"]);
}

#[test]
fn test_missing_metadata_is_an_empty_section() {
    let datasets = structure_datasets(
        json!({"MediaContainer": {"size": 0}}),
        json!({"MediaContainer": {"size": 0}}),
    )
    .unwrap();
    assert!(datasets.movies.is_empty());
    assert!(datasets.genres.is_empty());
    assert!(datasets.history.is_empty());
}

#[test]
fn test_malformed_payloads_are_payload_errors() {
    let missing_container = structure_datasets(json!({"Metadata": []}), history_payload());
    assert!(matches!(missing_container, Err(Error::Payload(_))));

    let tag_without_text = json!({
        "MediaContainer": {"Metadata": [
            {"type": "movie", "title": "Dune", "Genre": [{"id": 3}]}
        ]}
    });
    assert!(matches!(
        structure_datasets(tag_without_text, history_payload()),
        Err(Error::Payload(_))
    ));
}

#[tokio::test]
async fn test_create_structured_datasets_fetches_both_payloads() {
    let mut server = MockMediaServer::new();
    server
        .expect_section_items()
        .withf(|id| *id == 1)
        .times(1)
        .returning(|_| Ok(section_payload()));
    server
        .expect_playback_history()
        .withf(|section, account| *section == 1 && *account == 7)
        .times(1)
        .returning(|_, _| Ok(history_payload()));

    let datasets = create_structured_datasets(&server, 1, 7).await.unwrap();
    assert_eq!(datasets.movies.len(), 2);
    assert_eq!(datasets.history.len(), 1);
}

#[tokio::test]
async fn test_upstream_failure_propagates() {
    let mut server = MockMediaServer::new();
    server
        .expect_section_items()
        .returning(|_| Err(Error::upstream("plex", 401, "Unauthorized")));
    server.expect_playback_history().never();

    let err = create_structured_datasets(&server, 1, 7).await.unwrap_err();
    match err {
        Error::Upstream { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
