//! # contract: interfaces to the two remote systems
//!
//! The pipeline talks to exactly two services:
//! - a Plex media server, read through [`MediaServer`]
//! - a SPARQL triple store (Fuseki), read and written through [`TripleStore`]
//!
//! Both traits are transport-agnostic. The CLI crate implements them over
//! `reqwest`; tests use the `mockall` mocks generated here.
//!
//! ## Mocking & Testing
//! - `MockMediaServer` and `MockTripleStore` are exported under the default
//!   `test-export-mocks` feature so dependent crates can use them in their tests.
//!
//! ## Error contract
//! - A non-success HTTP status must come back as [`Error::Upstream`] carrying
//!   the response body verbatim.
//! - Implementations must not retry.

use async_trait::async_trait;
use mockall::automock;
use oxrdf::Graph;

use crate::error::{Error, Result};

/// Selects the default graph or a named graph of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphName {
    Default,
    /// Resolved by the store client against its graph base IRI.
    Named(String),
}

impl GraphName {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }
}

impl std::fmt::Display for GraphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphName::Default => f.write_str("default"),
            GraphName::Named(name) => f.write_str(name),
        }
    }
}

/// Read access to a Plex media server. Payloads are returned as raw JSON;
/// reshaping them is the job of [`crate::extract`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// `GET /library/sections`
    async fn libraries(&self) -> Result<serde_json::Value>;

    /// `GET /library/sections/{section_id}/all`
    async fn section_items(&self, section_id: u32) -> Result<serde_json::Value>;

    /// `GET /status/sessions/history/all?librarySectionID=..&accountID=..`
    async fn playback_history(&self, section_id: u32, account_id: u32)
        -> Result<serde_json::Value>;
}

/// The four operations the pipeline needs from a SPARQL graph store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Download a whole graph.
    async fn fetch_graph(&self, graph: &GraphName) -> Result<Graph>;

    /// Replace a whole graph with the given Turtle document. Returns the
    /// store's JSON acknowledgement.
    async fn replace_graph(&self, graph: &GraphName, turtle: &str) -> Result<serde_json::Value>;

    /// Run a read-only SPARQL query and return its JSON results.
    async fn run_query(&self, query: &str) -> Result<serde_json::Value>;

    /// Run a SPARQL update.
    async fn run_update(&self, update: &str) -> Result<()>;
}

/// Helper for implementors: turn a non-success status into [`Error::Upstream`].
pub fn ensure_success(service: &'static str, status: u16, body: String) -> Result<String> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        tracing::error!(service, status, body = %body, "Upstream returned error status");
        Err(Error::upstream(service, status, body))
    }
}
