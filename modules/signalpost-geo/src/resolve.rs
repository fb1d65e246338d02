//! Geocode resolution: place-name candidate in, coordinates out.
//!
//! One cascade, one implementation. Dependencies (gazetteer, cache,
//! remote services) are injected, so each tier tests in isolation and
//! service availability is decided once at startup, not re-checked per
//! call. Any tier failure logs and falls through; only an exhausted
//! cascade produces "unresolved", which is cached as a negative so the
//! name never costs remote calls again.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use signalpost_common::{
    normalize_key, BoundingBox, GeoPoint, ResolutionTier, ResolvedLocation,
};

use crate::cache::{CacheLookup, GeocodeCache};
use crate::fuzzy;
use crate::gazetteer::{Gazetteer, GazetteerAppendLog};
use crate::generic;

// --- Strategy seams ---

/// Forward geocoding against an external web service.
#[async_trait]
pub trait ForwardGeocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>>;
}

/// Remote language-model tiers: place-name extraction from raw text and
/// coordinate estimation for a named place.
#[async_trait]
pub trait LocationModel: Send + Sync {
    async fn extract_place(&self, text: &str) -> Result<Option<String>>;
    async fn estimate_coords(&self, place: &str) -> Result<Option<GeoPoint>>;
}

/// Outcome of a resolution attempt. Unresolved is a normal, expected
/// result — many posts simply have no resolvable location.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedLocation),
    Unresolved,
}

impl Resolution {
    pub fn into_option(self) -> Option<ResolvedLocation> {
        match self {
            Resolution::Resolved(location) => Some(location),
            Resolution::Unresolved => None,
        }
    }
}

pub struct Resolver {
    gazetteer: Arc<Gazetteer>,
    cache: Mutex<GeocodeCache>,
    bounds: BoundingBox,
    fuzzy_threshold: u8,
    region_query_suffix: String,
    geocoder: Option<Arc<dyn ForwardGeocoder>>,
    model: Option<Arc<dyn LocationModel>>,
    append_log: Option<GazetteerAppendLog>,
}

impl Resolver {
    pub fn new(
        gazetteer: Arc<Gazetteer>,
        cache: GeocodeCache,
        bounds: BoundingBox,
        fuzzy_threshold: u8,
        region_query_suffix: impl Into<String>,
    ) -> Self {
        Self {
            gazetteer,
            cache: Mutex::new(cache),
            bounds,
            fuzzy_threshold,
            region_query_suffix: region_query_suffix.into(),
            geocoder: None,
            model: None,
            append_log: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ForwardGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn LocationModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Record model-resolved names in a write-ahead log so future runs get
    /// a direct gazetteer hit after an offline merge.
    pub fn with_append_log(mut self, log: GazetteerAppendLog) -> Self {
        self.append_log = Some(log);
        self
    }

    fn cache(&self) -> MutexGuard<'_, GeocodeCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn resolve(&self, name: &str) -> Resolution {
        let key = normalize_key(name);
        if key.is_empty() {
            return Resolution::Unresolved;
        }

        // Tier 1: direct gazetteer hit.
        if let Some(entry) = self.gazetteer.get_normalized(&key) {
            debug!(name = %entry.name, "Resolved via gazetteer");
            return Resolution::Resolved(ResolvedLocation {
                name: entry.name.clone(),
                point: entry.point(),
                district: entry.district.clone(),
                tier: ResolutionTier::Gazetteer,
            });
        }

        // Tier 2: generic-region centroid.
        if let Some(region) = generic::lookup(&key) {
            debug!(name = region.name, "Resolved via generic region");
            return Resolution::Resolved(ResolvedLocation {
                name: region.name.to_string(),
                point: region.point(),
                district: Some(region.name.to_string()),
                tier: ResolutionTier::GenericRegion,
            });
        }

        // Tier 3: cache. A cached negative short-circuits the whole
        // cascade — the name is known unresolvable.
        match self.cache().get(&key) {
            CacheLookup::Hit(point) => {
                debug!(name = %key, "Resolved via cache");
                return Resolution::Resolved(ResolvedLocation {
                    name: name.trim().to_string(),
                    point,
                    district: None,
                    tier: ResolutionTier::Cache,
                });
            }
            CacheLookup::Negative => {
                debug!(name = %key, "Cached negative, skipping remote tiers");
                return Resolution::Unresolved;
            }
            CacheLookup::Miss => {}
        }

        // Tier 4: fuzzy match against the gazetteer.
        if let Some((entry, score)) = fuzzy::best_match(name, &self.gazetteer, self.fuzzy_threshold)
        {
            info!(query = %key, matched = %entry.name, score, "Resolved via fuzzy match");
            self.cache().put(&key, Some(entry.point()));
            return Resolution::Resolved(ResolvedLocation {
                name: entry.name.clone(),
                point: entry.point(),
                district: entry.district.clone(),
                tier: ResolutionTier::Fuzzy,
            });
        }

        // Tier 5: external geocoder, biased toward the region and bounds-
        // checked so a same-named town elsewhere never wins.
        if let Some(geocoder) = &self.geocoder {
            let query = format!("{}, {}", name.trim(), self.region_query_suffix);
            match geocoder.geocode(&query).await {
                Ok(Some(point)) if self.bounds.contains_point(point) => {
                    info!(name = %key, lat = point.lat, lon = point.lon, "Resolved via external geocoder");
                    self.cache().put(&key, Some(point));
                    return Resolution::Resolved(ResolvedLocation {
                        name: name.trim().to_string(),
                        point,
                        district: None,
                        tier: ResolutionTier::ExternalGeocoder,
                    });
                }
                Ok(Some(point)) => {
                    warn!(name = %key, lat = point.lat, lon = point.lon, "Geocoder result out of bounds, ignoring");
                }
                Ok(None) => debug!(name = %key, "Geocoder returned no results"),
                Err(e) => warn!(name = %key, error = %e, "Geocoder tier failed"),
            }
        }

        // Tier 6: model coordinate estimate, also bounds-checked. Success
        // feeds the append log so the next run gets a direct hit.
        if let Some(model) = &self.model {
            match model.estimate_coords(name.trim()).await {
                Ok(Some(point)) if self.bounds.contains_point(point) => {
                    info!(name = %key, lat = point.lat, lon = point.lon, "Resolved via model estimate");
                    self.cache().put(&key, Some(point));
                    if let Some(log) = &self.append_log {
                        if let Err(e) = log.append(&self.gazetteer, name.trim(), point) {
                            warn!(name = %key, error = %e, "Failed to append to gazetteer log");
                        }
                    }
                    return Resolution::Resolved(ResolvedLocation {
                        name: name.trim().to_string(),
                        point,
                        district: None,
                        tier: ResolutionTier::Model,
                    });
                }
                Ok(Some(point)) => {
                    warn!(name = %key, lat = point.lat, lon = point.lon, "Model estimate out of bounds, ignoring");
                }
                Ok(None) => debug!(name = %key, "Model returned no estimate"),
                Err(e) => warn!(name = %key, error = %e, "Model tier failed"),
            }
        }

        info!(name = %key, "Unresolved, caching negative");
        self.cache().put(&key, None);
        Resolution::Unresolved
    }
}
