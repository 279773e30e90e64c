/// # plex-kg CLI Interface (Module)
///
/// Command parsing and dispatch for the `plex-kg` binary. The pipelines
/// themselves live in [`plex_kg_core`]; this module wires the concrete
/// clients and the loaded config into them and prints the results.
///
/// ## Commands
/// - `libraries`, `section`, `history`: inspect the raw Plex payloads.
/// - `build`: write `data.ttl`, or `error_report.ttl` when validation fails.
/// - `publish`: upload to the triple store and print the store's acknowledgements.
/// - `query`, `recommend`: run a stored SPARQL query.
///
/// For programmatic and integration-test use, call [`run`] with a constructed [`Cli`].
use crate::fuseki::FusekiClient;
use crate::load_config::{load_config, CliConfig};
use crate::plex::PlexClient;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plex_kg_core::contract::MediaServer;
use plex_kg_core::synchronise::{
    build_artifact, recommend, run_named_query, Publisher, RecommendationKind, SynchroniseOutcome,
};
use plex_kg_core::validate::TurtleArtifact;
use std::path::{Path, PathBuf};

/// CLI for plex-kg: turn a Plex library into a validated RDF knowledge graph.
#[derive(Debug, Parser)]
#[clap(
    name = "plex-kg",
    version,
    about = "Build, validate and publish an RDF knowledge graph of a Plex library"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "plex-kg.yaml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the libraries on the Plex server
    Libraries,
    /// Show the first items of a library section
    Section {
        /// The library's `key`, as listed by `libraries`
        section_id: u32,
        #[clap(long, default_value_t = 3)]
        limit: usize,
    },
    /// Show the first entries of an account's playback history for a section
    History {
        section_id: u32,
        account_id: u32,
        #[clap(long, default_value_t = 3)]
        limit: usize,
    },
    /// Build and validate the graph, writing data.ttl or error_report.ttl
    Build {
        section_id: u32,
        account_id: u32,
        /// Directory the Turtle file is written to
        #[clap(long, default_value = ".")]
        out: PathBuf,
    },
    /// Build, validate and publish the graph to the triple store
    Publish {
        section_id: u32,
        account_id: u32,
        /// Directory error_report.ttl is written to on failure
        #[clap(long, default_value = ".")]
        out: PathBuf,
    },
    /// Run <rdf_dir>/queries/<name>.rq against the triple store
    Query { name: String },
    /// Run one of the recommendation queries
    Recommend {
        #[clap(value_enum)]
        kind: RecommendKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecommendKind {
    Genres,
    Persons,
    Movies,
}

impl From<RecommendKind> for RecommendationKind {
    fn from(kind: RecommendKind) -> Self {
        match kind {
            RecommendKind::Genres => RecommendationKind::Genres,
            RecommendKind::Persons => RecommendationKind::Persons,
            RecommendKind::Movies => RecommendationKind::Movies,
        }
    }
}

/// Keep only the first `limit` entries of `MediaContainer.Metadata`.
pub fn truncate_metadata(payload: &mut serde_json::Value, limit: usize) {
    if let Some(items) = payload
        .pointer_mut("/MediaContainer/Metadata")
        .and_then(serde_json::Value::as_array_mut)
    {
        items.truncate(limit);
    }
}

/// Label graph-construction failures so the user knows to look at the logs.
fn surface(err: plex_kg_core::Error) -> anyhow::Error {
    match err {
        e @ plex_kg_core::Error::WrongMediaType { .. } => {
            anyhow::Error::new(e).context("Graph construction failed. Check the log output for details")
        }
        e => e.into(),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_artifact(out: &Path, artifact: &TurtleArtifact) -> Result<PathBuf> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory {}", out.display()))?;
    let path = out.join(artifact.filename);
    std::fs::write(&path, &artifact.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), status = artifact.status, "Wrote artifact");
    Ok(path)
}

fn plex_client(config: &CliConfig) -> Result<PlexClient> {
    PlexClient::new_from_env(&config.plex).context("Failed to construct Plex client from env")
}

fn store_client(config: &CliConfig) -> Result<FusekiClient> {
    FusekiClient::new_from_env(&config.store, config.pipeline.graph.base_iri.clone())
        .context("Failed to construct triple store client from env")
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Libraries => {
            let libraries = plex_client(&config)?.libraries().await?;
            print_json(&libraries)
        }
        Commands::Section { section_id, limit } => {
            let mut items = plex_client(&config)?.section_items(section_id).await?;
            truncate_metadata(&mut items, limit);
            print_json(&items)
        }
        Commands::History {
            section_id,
            account_id,
            limit,
        } => {
            let mut history = plex_client(&config)?
                .playback_history(section_id, account_id)
                .await?;
            truncate_metadata(&mut history, limit);
            print_json(&history)
        }
        Commands::Build {
            section_id,
            account_id,
            out,
        } => {
            tracing::info!(command = "build", section_id, account_id, "Starting graph build");
            let plex = plex_client(&config)?;
            let artifact = build_artifact(&plex, &config.pipeline, section_id, account_id)
                .await
                .map_err(surface)?;
            let path = write_artifact(&out, &artifact)?;
            println!("{}", path.display());
            if !artifact.is_success() {
                anyhow::bail!(
                    "Graph does not conform to its shapes; report written to {}",
                    path.display()
                );
            }
            Ok(())
        }
        Commands::Publish {
            section_id,
            account_id,
            out,
        } => {
            tracing::info!(command = "publish", section_id, account_id, "Starting publish");
            let plex = plex_client(&config)?;
            let store = store_client(&config)?;
            let publisher = Publisher::new(config.pipeline.clone());
            match publisher
                .synchronise(&plex, &store, section_id, account_id)
                .await
                .map_err(surface)?
            {
                SynchroniseOutcome::Published(report) => {
                    tracing::info!(command = "publish", triples = report.triples, "Publish complete");
                    print_json(&report)
                }
                SynchroniseOutcome::Rejected(artifact) => {
                    let path = write_artifact(&out, &artifact)?;
                    tracing::error!(command = "publish", path = %path.display(), "Publish rejected by validation");
                    anyhow::bail!(
                        "Graph does not conform to its shapes; report written to {}",
                        path.display()
                    )
                }
            }
        }
        Commands::Query { name } => {
            let store = store_client(&config)?;
            let results = run_named_query(&store, &config.pipeline.rdf_files(), &name).await?;
            print_json(&results)
        }
        Commands::Recommend { kind } => {
            let store = store_client(&config)?;
            let results = recommend(&store, &config.pipeline.rdf_files(), kind.into()).await?;
            print_json(&results)
        }
    }
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let result = execute(cli).await;

    let span = tracing::info_span!("exit", success = result.is_ok());
    let _entered = span.enter();
    match &result {
        Ok(()) => tracing::info!("exit"),
        Err(e) => tracing::error!(error = %e, "exit"),
    }
    result
}
