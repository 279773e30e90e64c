//! High-level pipelines: build → validate → publish.
//!
//! # Pipelines
//! - [`build_artifact`]: fetch one library section and its watch history,
//!   assemble the graph and validate it. The result is a [`TurtleArtifact`]
//!   holding either the data graph or the violation report.
//! - [`Publisher::synchronise`]: the build pipeline followed by the upload
//!   sequence against a [`TripleStore`]: default graph, ontology graph,
//!   relationship derivation, then validation of what the store now holds.
//! - [`run_named_query`] / [`recommend`]: run one of the stored SPARQL queries.
//!
//! # Error Handling
//! Every failed step returns immediately; nothing is retried. A graph that
//! does not conform is not an error: it comes back as a rejected outcome
//! carrying the report.
//!
//! # Concurrency
//! Each call runs its steps one after the other. Publishes through the same
//! [`Publisher`] are serialized; nothing coordinates separate processes.

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{
    PipelineConfig, RdfFiles, CONSTRUCT_RELATIONSHIPS_QUERY, ONTOLOGY_GRAPH, RELATIONS_GRAPH,
};
use crate::contract::{GraphName, MediaServer, TripleStore};
use crate::error::{Error, Result};
use crate::extract::create_structured_datasets;
use crate::graph::build_graph;
use crate::rdf::{merge_graphs, parse_turtle, standard_prefixes, OrderedGraph};
use crate::validate::{load_shapes, TurtleArtifact, Validator};

/// Reported once the relationship update has been accepted by the store.
pub const RELATIONSHIPS_BUILT: &str = "Successfully built.";

/// The three stored recommendation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKind {
    Genres,
    Persons,
    Movies,
}

impl RecommendationKind {
    pub fn query_name(self) -> &'static str {
        match self {
            RecommendationKind::Genres => "recommend_genres",
            RecommendationKind::Persons => "recommend_persons",
            RecommendationKind::Movies => "recommend_movies",
        }
    }
}

impl std::str::FromStr for RecommendationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "genres" => Ok(RecommendationKind::Genres),
            "persons" => Ok(RecommendationKind::Persons),
            "movies" => Ok(RecommendationKind::Movies),
            other => Err(Error::InvalidName(other.to_string())),
        }
    }
}

/// What the store acknowledged for each upload step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynchroniseReport {
    pub data: serde_json::Value,
    pub ontology: serde_json::Value,
    pub relationships: String,
    /// Size of the locally built graph.
    #[serde(skip)]
    pub triples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynchroniseOutcome {
    Published(SynchroniseReport),
    /// Validation failed; the artifact holds the report (status 400).
    Rejected(TurtleArtifact),
}

/// Load the given shape documents, mixing in the ontology when configured.
pub fn validator_for(config: &PipelineConfig, shape_ids: &[String]) -> Result<Validator> {
    let files = config.rdf_files();
    let validator = load_shapes(&files, shape_ids)?;
    if !config.validation.use_ontology {
        return Ok(validator);
    }
    let ontology = parse_turtle(&files.ontology()?, None)?;
    debug!(triples = ontology.len(), "Mixing ontology into validation");
    Ok(validator.with_ontology(ontology))
}

/// Validate a built graph and serialize whichever document is delivered.
pub fn render_artifact(
    config: &PipelineConfig,
    graph: &OrderedGraph,
    validator: &Validator,
) -> Result<TurtleArtifact> {
    let base = &config.graph.base_iri;
    let report = validator.validate(graph.graph());
    if report.conforms {
        Ok(TurtleArtifact::data(
            graph.to_turtle(&standard_prefixes(base))?,
        ))
    } else {
        warn!(
            results = report.results.len(),
            "[BUILD] Graph does not conform, returning violation report"
        );
        debug!(report = %report, "[BUILD] Violation report");
        Ok(TurtleArtifact::report(report.to_turtle(base)?))
    }
}

/// fetch → reshape → assemble → validate, for one section and one account.
pub async fn build_artifact<M>(
    server: &M,
    config: &PipelineConfig,
    section_id: u32,
    account_id: u32,
) -> Result<TurtleArtifact>
where
    M: MediaServer + ?Sized,
{
    info!(section_id, account_id, "[BUILD] Starting graph build");
    let datasets = create_structured_datasets(server, section_id, account_id)
        .await
        .inspect_err(|e| error!(error = %e, "[BUILD][ERROR] Fetching Plex data failed"))?;
    let graph = build_graph(&config.graph, &datasets)
        .inspect_err(|e| error!(error = %e, "[BUILD][ERROR] Graph assembly failed"))?;
    let validator = validator_for(config, &config.validation.build_shapes)?;
    let artifact = render_artifact(config, &graph, &validator)?;
    info!(
        status = artifact.status,
        filename = artifact.filename,
        "[BUILD] Finished"
    );
    Ok(artifact)
}

/// Runs the publish sequence, one run at a time.
///
/// Serialization only covers callers sharing this `Publisher`. The CLI builds
/// one per invocation, so there it guards nothing; separate processes writing
/// the same dataset are not coordinated.
#[derive(Debug)]
pub struct Publisher {
    config: PipelineConfig,
    lock: Mutex<()>,
}

impl Publisher {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build, validate, upload the default and ontology graphs, derive the
    /// relations graph in the store, then validate the store's contents.
    pub async fn synchronise<M, S>(
        &self,
        server: &M,
        store: &S,
        section_id: u32,
        account_id: u32,
    ) -> Result<SynchroniseOutcome>
    where
        M: MediaServer + ?Sized,
        S: TripleStore + ?Sized,
    {
        let _guard = self.lock.lock().await;
        let config = &self.config;
        let files = config.rdf_files();
        info!(section_id, account_id, "[SYNC] Starting publish pipeline");

        // Step 1: build and check the graph locally.
        let datasets = create_structured_datasets(server, section_id, account_id)
            .await
            .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Fetching Plex data failed"))?;
        let graph = build_graph(&config.graph, &datasets)
            .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Graph assembly failed"))?;
        let build_validator = validator_for(config, &config.validation.build_shapes)?;
        let artifact = render_artifact(config, &graph, &build_validator)?;
        if !artifact.is_success() {
            warn!("[SYNC] Local validation failed, nothing uploaded");
            return Ok(SynchroniseOutcome::Rejected(artifact));
        }
        info!(triples = graph.len(), "[SYNC] Local validation passed");

        // Step 2: default graph.
        let data = store
            .replace_graph(&GraphName::Default, &artifact.content)
            .await
            .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Uploading default graph failed"))?;
        info!("[SYNC][UPLOAD] Default graph replaced");

        // Step 3: ontology graph.
        let ontology_ttl = files.ontology()?;
        let ontology = store
            .replace_graph(&GraphName::named(ONTOLOGY_GRAPH), &ontology_ttl)
            .await
            .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Uploading ontology failed"))?;
        info!("[SYNC][UPLOAD] Ontology graph replaced");

        // Step 4: relations graph, derived inside the store.
        let update = files.query(CONSTRUCT_RELATIONSHIPS_QUERY)?;
        store
            .run_update(&update)
            .await
            .inspect_err(|e| error!(error = %e, "[SYNC][ERROR] Relationship update failed"))?;
        info!("[SYNC] Relationship graph constructed");

        // Step 5: validate what the store holds now.
        let default_graph = store.fetch_graph(&GraphName::Default).await?;
        let relations_graph = store
            .fetch_graph(&GraphName::named(RELATIONS_GRAPH))
            .await?;
        let published = merge_graphs([&default_graph, &relations_graph]);
        debug!(
            default = default_graph.len(),
            relations = relations_graph.len(),
            "[SYNC] Fetched published graphs"
        );

        let publish_validator = validator_for(config, &config.validation.publish_shapes)?;
        let report = publish_validator.validate(&published);
        if !report.conforms {
            warn!(
                results = report.results.len(),
                "[SYNC] Published graphs do not conform"
            );
            let content = report.to_turtle(&config.graph.base_iri)?;
            return Ok(SynchroniseOutcome::Rejected(TurtleArtifact::report(content)));
        }

        info!(triples = graph.len(), "[SYNC] Publish pipeline finished");
        Ok(SynchroniseOutcome::Published(SynchroniseReport {
            data,
            ontology,
            relationships: RELATIONSHIPS_BUILT.to_string(),
            triples: graph.len(),
        }))
    }
}

/// Run `<rdf>/queries/<name>.rq` and return the store's JSON results.
pub async fn run_named_query<S>(store: &S, files: &RdfFiles, name: &str) -> Result<serde_json::Value>
where
    S: TripleStore + ?Sized,
{
    let query = files.query(name)?;
    info!(query = name, "[QUERY] Running stored query");
    store
        .run_query(&query)
        .await
        .inspect_err(|e| error!(query = name, error = %e, "[QUERY][ERROR] Query failed"))
}

pub async fn recommend<S>(
    store: &S,
    files: &RdfFiles,
    kind: RecommendationKind,
) -> Result<serde_json::Value>
where
    S: TripleStore + ?Sized,
{
    run_named_query(store, files, kind.query_name()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_kinds_map_to_stored_queries() {
        assert_eq!(
            "genres".parse::<RecommendationKind>().unwrap().query_name(),
            "recommend_genres"
        );
        assert_eq!(RecommendationKind::Persons.query_name(), "recommend_persons");
        assert_eq!(RecommendationKind::Movies.query_name(), "recommend_movies");
        assert!("tv".parse::<RecommendationKind>().is_err());
    }

    #[test]
    fn report_serializes_the_three_acknowledgements() {
        let report = SynchroniseReport {
            data: serde_json::json!({"count": 3}),
            ontology: serde_json::json!({"count": 1}),
            relationships: RELATIONSHIPS_BUILT.to_string(),
            triples: 3,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": {"count": 3},
                "ontology": {"count": 1},
                "relationships": "Successfully built."
            })
        );
    }
}
