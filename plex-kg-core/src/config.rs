use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub const DEFAULT_BASE_IRI: &str = "http://plex-kg/";
pub const RELATIONS_GRAPH: &str = "relations";
pub const ONTOLOGY_GRAPH: &str = "ontology";
pub const CONSTRUCT_RELATIONSHIPS_QUERY: &str = "construct_relationships";

/// Everything the pipeline needs that is not a secret or a transport detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub graph: GraphConfig,
    /// Root of the query, shape and ontology files.
    pub rdf_dir: PathBuf,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            rdf_dir: PathBuf::from("rdf"),
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            base_iri = %self.graph.base_iri,
            watcher = %self.graph.watcher.slug,
            rdf_dir = %self.rdf_dir.display(),
            build_shapes = ?self.validation.build_shapes,
            publish_shapes = ?self.validation.publish_shapes,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }

    pub fn rdf_files(&self) -> RdfFiles {
        RdfFiles::new(&self.rdf_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Namespace every minted IRI is resolved against. Must end in `/` or `#`.
    pub base_iri: String,
    pub watcher: WatcherIdentity,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_iri: DEFAULT_BASE_IRI.to_string(),
            watcher: WatcherIdentity::default(),
        }
    }
}

/// The person every watch event is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherIdentity {
    pub slug: String,
    pub name: String,
}

impl Default for WatcherIdentity {
    fn default() -> Self {
        Self {
            slug: "plex-watcher".to_string(),
            name: "Plex Watcher".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Shapes applied to a freshly built graph.
    pub build_shapes: Vec<String>,
    /// Shapes applied to the published default + relations graphs.
    pub publish_shapes: Vec<String>,
    /// Mix `ontology.ttl` into the data graph before RDFS inference.
    pub use_ontology: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            build_shapes: vec!["default".to_string()],
            publish_shapes: vec!["default".to_string(), RELATIONS_GRAPH.to_string()],
            use_ontology: false,
        }
    }
}

/// Reject anything that could escape the rdf directory.
pub fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Read-at-call-time access to the on-disk RDF assets:
///
/// ```text
/// <root>/ontology.ttl
/// <root>/shapes/<id>.ttl
/// <root>/queries/<name>.rq
/// ```
#[derive(Debug, Clone)]
pub struct RdfFiles {
    root: PathBuf,
}

impl RdfFiles {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn query(&self, name: &str) -> Result<String> {
        check_name(name)?;
        self.read(self.root.join("queries").join(format!("{name}.rq")))
    }

    pub fn shape(&self, id: &str) -> Result<String> {
        check_name(id)?;
        self.read(self.root.join("shapes").join(format!("{id}.ttl")))
    }

    pub fn ontology(&self) -> Result<String> {
        self.read(self.root.join("ontology.ttl"))
    }

    fn read(&self, path: PathBuf) -> Result<String> {
        debug!(path = %path.display(), "Reading rdf asset");
        std::fs::read_to_string(&path).map_err(|e| {
            tracing::error!(error = ?e, path = %path.display(), "Failed to read rdf asset");
            Error::io(path, e)
        })
    }
}
