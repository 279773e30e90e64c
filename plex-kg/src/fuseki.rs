//! # Fuseki triple store client
//!
//! Implements [`TripleStore`] against a Fuseki dataset using the SPARQL Graph
//! Store Protocol (`/data`), the query endpoint (`/query`) and the update
//! endpoint (`/update`). All calls use basic auth from `FUSEKI_USER` /
//! `FUSEKI_PASSWORD` and a fixed timeout.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use oxrdf::Graph;
use plex_kg_core::contract::{ensure_success, GraphName, TripleStore};
use plex_kg_core::rdf::parse_turtle;
use plex_kg_core::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::Deserialize;

pub const SERVICE: &str = "fuseki";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Dataset URL, e.g. `http://localhost:3030/plex`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3030/plex".to_string(),
            timeout_secs: 10,
        }
    }
}

pub struct FusekiClient {
    http: reqwest::Client,
    base_url: String,
    graph_base: String,
    user: String,
    password: String,
}

impl FusekiClient {
    /// `graph_base` is the prefix of every named graph IRI.
    pub fn new(
        settings: &StoreSettings,
        graph_base: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let client = Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            graph_base: graph_base.into(),
            user: user.into(),
            password: password.into(),
        };
        tracing::info!(
            base_url = %client.base_url,
            graph_base = %client.graph_base,
            "Initialized FusekiClient"
        );
        Ok(client)
    }

    pub fn new_from_env(settings: &StoreSettings, graph_base: impl Into<String>) -> Result<Self> {
        match (env::var("FUSEKI_USER"), env::var("FUSEKI_PASSWORD")) {
            (Ok(user), Ok(password)) => Self::new(settings, graph_base, user, password),
            (Err(e), _) => {
                tracing::error!(error = ?e, "FUSEKI_USER missing in environment");
                Err(Error::Config("FUSEKI_USER must be set".to_string()))
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "FUSEKI_PASSWORD missing in environment");
                Err(Error::Config("FUSEKI_PASSWORD must be set".to_string()))
            }
        }
    }

    /// IRI of a named graph; `None` for the default graph.
    pub fn graph_iri(&self, graph: &GraphName) -> Option<String> {
        match graph {
            GraphName::Default => None,
            GraphName::Named(name) => Some(format!("{}{name}", self.graph_base)),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, operation: &'static str) -> Result<String> {
        let response = request
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, operation, "Fuseki request failed");
                e
            })?;
        let status = response.status().as_u16();
        tracing::debug!(operation, status, "Fuseki responded");
        ensure_success(SERVICE, status, response.text().await?)
    }
}

#[async_trait]
impl TripleStore for FusekiClient {
    async fn fetch_graph(&self, graph: &GraphName) -> Result<Graph> {
        let selector = self
            .graph_iri(graph)
            .unwrap_or_else(|| "default".to_string());
        tracing::info!(graph = %selector, "Downloading graph");
        let request = self
            .http
            .get(self.endpoint("data"))
            .query(&[("graph", selector.as_str())])
            .header(ACCEPT, "text/turtle");
        let body = self.send(request, "fetch_graph").await?;
        parse_turtle(&body, None)
    }

    async fn replace_graph(&self, graph: &GraphName, turtle: &str) -> Result<serde_json::Value> {
        let mut request = self.http.put(self.endpoint("data"));
        if let Some(iri) = self.graph_iri(graph) {
            request = request.query(&[("graph", iri)]);
        }
        tracing::info!(graph = %graph, bytes = turtle.len(), "Replacing graph");
        let body = self
            .send(
                request
                    .header(CONTENT_TYPE, "text/turtle")
                    .header(ACCEPT, "application/json")
                    .body(turtle.to_string()),
                "replace_graph",
            )
            .await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn run_query(&self, query: &str) -> Result<serde_json::Value> {
        tracing::info!(bytes = query.len(), "Running SPARQL query");
        let request = self
            .http
            .post(self.endpoint("query"))
            .header(ACCEPT, "application/sparql-results+json, application/json")
            .form(&[("query", query)]);
        let body = self.send(request, "run_query").await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn run_update(&self, update: &str) -> Result<()> {
        tracing::info!(bytes = update.len(), "Running SPARQL update");
        let request = self
            .http
            .post(self.endpoint("update"))
            .header(CONTENT_TYPE, "application/sparql-update")
            .body(update.to_string());
        self.send(request, "run_update").await?;
        Ok(())
    }
}
