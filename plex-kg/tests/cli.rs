use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

use plex_kg::cli::{run, truncate_metadata, Cli, Commands, RecommendKind};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    // The config file does not exist, so run fails right after start-up.
    let cli = Cli {
        config: std::path::PathBuf::from("dummy.yaml"),
        command: Commands::Recommend {
            kind: RecommendKind::Genres,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
    assert!(event_msgs.iter().any(|msg| msg.contains("exit")));
}

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = Command::cargo_bin("plex-kg").expect("Binary exists");
    cmd.arg("--help");

    let mut assert = cmd.assert().success();
    for name in [
        "libraries",
        "section",
        "history",
        "build",
        "publish",
        "query",
        "recommend",
    ] {
        assert = assert.stdout(predicate::str::contains(name));
    }
}

#[test]
fn unknown_recommendation_kind_is_rejected() {
    let mut cmd = Command::cargo_bin("plex-kg").expect("Binary exists");
    cmd.args(["recommend", "actors"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("plex-kg").expect("Binary exists");
    cmd.args(["--config", "no/such/plex-kg.yaml", "libraries"]);

    cmd.assert().failure();
}

#[test]
fn truncate_metadata_keeps_leading_items() {
    let mut payload = json!({
        "MediaContainer": {
            "size": 4,
            "Metadata": [{"title": "a"}, {"title": "b"}, {"title": "c"}, {"title": "d"}]
        }
    });

    truncate_metadata(&mut payload, 3);

    let titles: Vec<_> = payload["MediaContainer"]["Metadata"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
    assert_eq!(payload["MediaContainer"]["size"], 4);
}

#[test]
fn truncate_metadata_ignores_payload_without_metadata() {
    let mut payload = json!({"MediaContainer": {"size": 0}});
    truncate_metadata(&mut payload, 3);
    assert_eq!(payload, json!({"MediaContainer": {"size": 0}}));
}
