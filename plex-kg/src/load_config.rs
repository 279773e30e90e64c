/// `load_config` module: reads the static YAML config file into [`CliConfig`].
///
/// The file carries no secrets. Credentials come from the environment and are
/// read by the clients themselves (`PLEX_TOKEN`, `PLEX_CLIENT_ID`,
/// `FUSEKI_USER`, `FUSEKI_PASSWORD`).
///
/// Every section and field has a default, so an empty file is a valid config:
///
/// ```yaml
/// plex:
///   base_url: http://localhost:32400
/// store:
///   base_url: http://localhost:3030/plex
/// pipeline:
///   rdf_dir: rdf
///   graph:
///     base_iri: http://plex-kg/
///     watcher: { slug: plex-watcher, name: Plex Watcher }
///   validation:
///     build_shapes: [default]
///     publish_shapes: [default, relations]
///     use_ontology: false
/// ```
///
/// # Errors
/// Failures are `anyhow::Error`s, logged before they are returned.
use anyhow::Result;
use plex_kg_core::config::PipelineConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::fuseki::StoreSettings;
use crate::plex::PlexSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub plex: PlexSettings,
    pub store: StoreSettings,
    pub pipeline: PipelineConfig,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // serde_yaml reads an empty document as unit, not as an empty mapping.
    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(CliConfig::default());
    }

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if !config.pipeline.graph.base_iri.ends_with(['/', '#']) {
        error!(base_iri = %config.pipeline.graph.base_iri, "Graph base IRI must end in '/' or '#'");
        return Err(anyhow::anyhow!(
            "pipeline.graph.base_iri must end in '/' or '#', got {}",
            config.pipeline.graph.base_iri
        ));
    }

    config.pipeline.trace_loaded();
    Ok(config)
}
