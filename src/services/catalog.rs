// src/services/catalog.rs
//! Jamendo catalog client

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

pub const JAMENDO_TRACKS_URL: &str = "https://api.jamendo.com/v3.0/tracks/";
pub const DEFAULT_TRACK_LIMIT: u32 = 25;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog API key not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Catalog API error: {0}")]
    Api(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A streamable track as described by the catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(deserialize_with = "deserialize_track_id")]
    pub id: String,
    pub name: String,
    pub artist_name: String,
    #[serde(default)]
    pub album_image: String,
    pub audio: String,
    /// Length in seconds, when the catalog reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// Jamendo returns ids as strings, but some mirrors emit numbers
fn deserialize_track_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected track id: {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ResponseHeaders {
    status: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    headers: Option<ResponseHeaders>,
    #[serde(default)]
    results: Vec<Track>,
}

/// Parses a raw tracks response body
pub fn parse_tracks(body: &str) -> Result<Vec<Track>, CatalogError> {
    let response: CatalogResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::SerializationError(e.to_string()))?;

    if let Some(headers) = response.headers {
        if headers.status.as_deref() == Some("failed") {
            return Err(CatalogError::Api(
                headers
                    .error_message
                    .unwrap_or_else(|| "request failed".to_string()),
            ));
        }
    }

    Ok(response.results)
}

#[derive(Debug, Clone)]
pub struct CatalogService {
    client: Client,
    api_key: Option<String>,
    limit: u32,
}

impl CatalogService {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            limit: DEFAULT_TRACK_LIMIT,
        }
    }

    pub fn tracks_url(&self) -> Result<String, CatalogError> {
        let api_key = self.api_key.as_deref().ok_or(CatalogError::NotConfigured)?;
        Ok(format!(
            "{}?client_id={}&format=json&limit={}",
            JAMENDO_TRACKS_URL,
            urlencoding::encode(api_key),
            self.limit
        ))
    }

    pub async fn fetch_tracks(&self) -> Result<Vec<Track>, CatalogError> {
        let url = self.tracks_url()?;
        debug!(limit = self.limit, "Fetching tracks from catalog");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::RequestFailed(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;

        let tracks = parse_tracks(&body)?;
        info!(count = tracks.len(), "Fetched tracks from catalog");
        Ok(tracks)
    }

    /// Fetches tracks, logging failures and yielding an empty list instead
    pub async fn fetch_tracks_or_empty(&self) -> Vec<Track> {
        match self.fetch_tracks().await {
            Ok(tracks) => tracks,
            Err(e) => {
                error!(error = %e, "Error fetching tracks");
                Vec::new()
            }
        }
    }
}
