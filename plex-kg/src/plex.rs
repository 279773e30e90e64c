//! # Plex media server client
//!
//! Implements [`MediaServer`] over `reqwest`. Every request carries the Plex
//! identification headers; the token is read from `PLEX_TOKEN` and the client
//! identifier from `PLEX_CLIENT_ID` (a random UUID when unset).

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use plex_kg_core::contract::{ensure_success, MediaServer};
use plex_kg_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Deserialize;
use uuid::Uuid;

pub const SERVICE: &str = "plex";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlexSettings {
    pub base_url: String,
    pub product: String,
    pub version: String,
    pub timeout_secs: u64,
}

impl Default for PlexSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:32400".to_string(),
            product: "plex-kg".to_string(),
            version: "0.1".to_string(),
            timeout_secs: 10,
        }
    }
}

pub struct PlexClient {
    http: reqwest::Client,
    base_url: String,
}

fn header(name: &'static str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| Error::Config(format!("invalid value for header {name}: {e}")))?;
    Ok((HeaderName::from_static(name), value))
}

impl PlexClient {
    pub fn new(settings: &PlexSettings, token: &str, client_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in [
            header("x-plex-token", token)?,
            header("x-plex-client-identifier", client_id)?,
            header("x-plex-product", &settings.product)?,
            header("x-plex-version", &settings.version)?,
        ] {
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        tracing::info!(
            base_url = %settings.base_url,
            client_id,
            "Initialized PlexClient"
        );
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn new_from_env(settings: &PlexSettings) -> Result<Self> {
        let token = env::var("PLEX_TOKEN").map_err(|e| {
            tracing::error!(error = ?e, "PLEX_TOKEN missing in environment");
            Error::Config("PLEX_TOKEN must be set".to_string())
        })?;
        let client_id = env::var("PLEX_CLIENT_ID").unwrap_or_else(|_| {
            let generated = Uuid::new_v4().to_string();
            tracing::info!(client_id = %generated, "PLEX_CLIENT_ID not set, generated one");
            generated
        });
        Self::new(settings, &token, &client_id)
    }

    async fn get_json(&self, path: &str, query: &[(&str, u32)]) -> Result<serde_json::Value> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, ?query, "Plex GET");
        let response = self.http.get(&url).query(query).send().await.map_err(|e| {
            tracing::error!(error = ?e, url = %url, "Plex request failed");
            e
        })?;
        let status = response.status().as_u16();
        let body = ensure_success(SERVICE, status, response.text().await?)?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn libraries(&self) -> Result<serde_json::Value> {
        tracing::info!("Fetching Plex libraries");
        self.get_json("/library/sections", &[]).await
    }

    async fn section_items(&self, section_id: u32) -> Result<serde_json::Value> {
        tracing::info!(section_id, "Fetching Plex section items");
        self.get_json(&format!("/library/sections/{section_id}/all"), &[])
            .await
    }

    async fn playback_history(
        &self,
        section_id: u32,
        account_id: u32,
    ) -> Result<serde_json::Value> {
        tracing::info!(section_id, account_id, "Fetching Plex playback history");
        self.get_json(
            "/status/sessions/history/all",
            &[("librarySectionID", section_id), ("accountID", account_id)],
        )
        .await
    }
}
