//! Forward geocoding via the Nominatim text-search API. Results carry
//! string-typed coordinate fields; only the first candidate is used, and
//! the resolver applies the bounds check — this client just fetches.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use signalpost_common::GeoPoint;

use crate::resolve::ForwardGeocoder;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("signalpost/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    http: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn first_point(results: &[SearchResult]) -> Result<Option<GeoPoint>> {
    let Some(first) = results.first() else {
        return Ok(None);
    };
    let lat: f64 = first
        .lat
        .parse()
        .map_err(|_| anyhow!("unparseable latitude {:?}", first.lat))?;
    let lon: f64 = first
        .lon
        .parse()
        .map_err(|_| anyhow!("unparseable longitude {:?}", first.lon))?;
    Ok(Some(GeoPoint::new(lat, lon)))
}

#[async_trait]
impl ForwardGeocoder for NominatimClient {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        let url = format!("{}/search", self.base_url);

        debug!(query, "Nominatim search");

        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Nominatim error: HTTP {}", response.status()));
        }

        let results: Vec<SearchResult> = response.json().await?;
        first_point(&results)
    }
}
