use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::types::BoundingBox;

/// Default region envelope (southern Levant), matching the reference
/// gazetteer coverage.
pub const DEFAULT_BOUNDS: BoundingBox = BoundingBox {
    lat_min: 29.5,
    lat_max: 33.5,
    lon_min: 34.0,
    lon_max: 35.9,
};

/// Default fuzzy-match cutoff on the 0-100 token-sort scale.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;

/// Application configuration loaded from environment variables.
///
/// Optional remote services (external geocoder, LLM locator) are modelled
/// as `Option` here; which resolver tiers get registered is decided once,
/// at startup, from this config.
#[derive(Debug, Clone)]
pub struct Config {
    // Reference data
    pub gazetteer_path: PathBuf,
    pub append_log_path: PathBuf,
    pub cache_path: PathBuf,

    // Region
    pub bounds: BoundingBox,
    pub region_query_suffix: String,

    // Matching
    pub fuzzy_threshold: u8,

    // External geocoder
    pub nominatim_base_url: String,

    // LLM locator (optional)
    pub llm_api_key: Option<String>,
    pub llm_api_base: String,
    pub llm_model: String,

    // Storage (optional; worker can run dry)
    pub database_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables. Everything has a
    /// default except the credentials for optional services, which stay
    /// `None` when unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gazetteer_path: PathBuf::from(env_or("GAZETTEER_PATH", "data/towns.geojson")),
            append_log_path: PathBuf::from(env_or(
                "GAZETTEER_APPEND_LOG",
                "data/gazetteer_append.ndjson",
            )),
            cache_path: PathBuf::from(env_or("GEOCODE_CACHE_PATH", "geocode_cache.json")),
            bounds: BoundingBox {
                lat_min: parse_env("REGION_LAT_MIN", DEFAULT_BOUNDS.lat_min)?,
                lat_max: parse_env("REGION_LAT_MAX", DEFAULT_BOUNDS.lat_max)?,
                lon_min: parse_env("REGION_LON_MIN", DEFAULT_BOUNDS.lon_min)?,
                lon_max: parse_env("REGION_LON_MAX", DEFAULT_BOUNDS.lon_max)?,
            },
            region_query_suffix: env_or("REGION_QUERY_SUFFIX", "Palestine"),
            fuzzy_threshold: parse_env("FUZZY_MATCH_THRESHOLD", DEFAULT_FUZZY_THRESHOLD)?,
            nominatim_base_url: env_or(
                "NOMINATIM_BASE_URL",
                "https://nominatim.openstreetmap.org",
            ),
            llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_api_base: env_or("LLM_API_BASE", "https://api.openai.com/v1"),
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
        })
    }

    /// Log the effective configuration without leaking credentials.
    pub fn log_redacted(&self) {
        info!(
            gazetteer = %self.gazetteer_path.display(),
            cache = %self.cache_path.display(),
            fuzzy_threshold = self.fuzzy_threshold,
            region_suffix = %self.region_query_suffix,
            llm_configured = self.llm_api_key.is_some(),
            database_configured = self.database_url.is_some(),
            "Config loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
