//! Gazetteer: the reference dataset mapping place names to coordinates.
//!
//! Loaded once at startup from a GeoJSON point collection and immutable
//! afterwards. Names learned at runtime (model-resolved places) are never
//! written into the canonical file; they go to a sidecar append log that
//! an explicit offline step merges back in.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use signalpost_common::{normalize_key, BoundingBox, GeoPoint, SignalPostError};

/// A known named place.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub district: Option<String>,
    pub place_type: Option<String>,
    pub native_name: Option<String>,
}

impl GazetteerEntry {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

// --- GeoJSON wire format ---

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Properties,
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Deserialize, Default)]
struct Properties {
    #[serde(default)]
    town_name: Option<String>,
    #[serde(default)]
    arabic_name: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default, rename = "type")]
    place_type: Option<String>,
}

/// In-memory gazetteer, indexed by normalized name.
///
/// Each entry is indexed under up to three keys: the primary name, the
/// native-script name, and the combined `"primary - native"` label, since
/// upstream text may carry any of the three. Key collisions are
/// last-write-wins.
#[derive(Debug, Default)]
pub struct Gazetteer {
    index: HashMap<String, Arc<GazetteerEntry>>,
}

impl Gazetteer {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a GeoJSON point collection. Malformed features (non-point
    /// geometry, missing coordinate pair, no name) and points outside the
    /// macro-region envelope are skipped without failing the load. A
    /// missing file yields an empty gazetteer: the pipeline keeps running
    /// on cache and remote tiers alone.
    pub fn load(path: &Path, bounds: &BoundingBox) -> Result<Self, SignalPostError> {
        if !path.exists() {
            warn!(path = %path.display(), "Gazetteer file not found, starting empty");
            return Ok(Self::empty());
        }

        let raw = fs::read_to_string(path)
            .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", path.display())))?;
        let collection: FeatureCollection = serde_json::from_str(&raw)
            .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", path.display())))?;

        let mut gazetteer = Self::empty();
        let mut skipped = 0u32;
        let mut out_of_bounds = 0u32;

        for value in collection.features {
            let feature: Feature = match serde_json::from_value(value) {
                Ok(f) => f,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed gazetteer feature");
                    skipped += 1;
                    continue;
                }
            };

            let Some(geometry) = feature.geometry else {
                skipped += 1;
                continue;
            };
            if geometry.kind != "Point" || geometry.coordinates.len() != 2 {
                skipped += 1;
                continue;
            }
            // GeoJSON order: [longitude, latitude]
            let (lon, lat) = (geometry.coordinates[0], geometry.coordinates[1]);

            let Some(name) = feature
                .properties
                .town_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            else {
                skipped += 1;
                continue;
            };

            if !bounds.contains(lat, lon) {
                debug!(name, lat, lon, "Skipping gazetteer entry outside region envelope");
                out_of_bounds += 1;
                continue;
            }

            gazetteer.insert(GazetteerEntry {
                name: name.to_string(),
                lat,
                lon,
                district: feature.properties.district.filter(|d| !d.is_empty()),
                place_type: feature.properties.place_type.filter(|t| !t.is_empty()),
                native_name: feature
                    .properties
                    .arabic_name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            });
        }

        info!(
            loaded = gazetteer.len(),
            skipped, out_of_bounds, "Gazetteer loaded"
        );
        Ok(gazetteer)
    }

    pub fn insert(&mut self, entry: GazetteerEntry) {
        let entry = Arc::new(entry);
        let mut keys = vec![normalize_key(&entry.name)];
        if let Some(native) = &entry.native_name {
            keys.push(normalize_key(native));
            keys.push(normalize_key(&format!("{} - {}", entry.name, native)));
        }
        for key in keys {
            if let Some(previous) = self.index.insert(key.clone(), Arc::clone(&entry)) {
                debug!(key, previous = %previous.name, "Gazetteer key collision, keeping newest");
            }
        }
    }

    /// Lookup by name; the key is normalized before the lookup.
    pub fn get(&self, name: &str) -> Option<&GazetteerEntry> {
        self.index.get(&normalize_key(name)).map(Arc::as_ref)
    }

    /// Lookup by an already-normalized key (hot path in the extractor).
    pub fn get_normalized(&self, key: &str) -> Option<&GazetteerEntry> {
        self.index.get(key).map(Arc::as_ref)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Number of distinct lookup keys (an entry with a native name counts
    /// under each of its keys).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Offline step: fold a runtime append log into this gazetteer.
    /// Malformed lines are skipped; names already present are ignored.
    /// Returns how many entries were added.
    pub fn merge_append_log(&mut self, log_path: &Path) -> Result<usize, SignalPostError> {
        if !log_path.exists() {
            return Ok(0);
        }
        let raw = fs::read_to_string(log_path)
            .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", log_path.display())))?;

        let mut merged = 0;
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            let row: AppendRow = match serde_json::from_str(line) {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed append-log line");
                    continue;
                }
            };
            if self.get(&row.name).is_some() {
                continue;
            }
            self.insert(GazetteerEntry {
                name: row.name,
                lat: row.lat,
                lon: row.lon,
                district: None,
                place_type: None,
                native_name: None,
            });
            merged += 1;
        }
        if merged > 0 {
            info!(merged, "Append log merged into gazetteer");
        }
        Ok(merged)
    }
}

// --- Append log ---

#[derive(Debug, Serialize, Deserialize)]
struct AppendRow {
    name: String,
    lat: f64,
    lon: f64,
}

/// Write-ahead log for names resolved at runtime by low-tier strategies.
/// One NDJSON row per name; duplicates are pre-checked case-insensitively
/// against both the gazetteer and the log itself.
#[derive(Debug, Clone)]
pub struct GazetteerAppendLog {
    path: PathBuf,
}

impl GazetteerAppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a newly learned name. Returns `false` (without writing) when
    /// the name is already known to the gazetteer or the log.
    pub fn append(
        &self,
        gazetteer: &Gazetteer,
        name: &str,
        point: GeoPoint,
    ) -> Result<bool, SignalPostError> {
        if gazetteer.get(name).is_some() {
            return Ok(false);
        }

        let key = normalize_key(name);
        if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", self.path.display())))?;
            for line in raw.lines().filter(|l| !l.trim().is_empty()) {
                if let Ok(row) = serde_json::from_str::<AppendRow>(line) {
                    if normalize_key(&row.name) == key {
                        return Ok(false);
                    }
                }
            }
        }

        let row = AppendRow {
            name: name.trim().to_string(),
            lat: point.lat,
            lon: point.lon,
        };
        let line = serde_json::to_string(&row)
            .map_err(|e| SignalPostError::Gazetteer(e.to_string()))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", self.path.display())))?;
        writeln!(file, "{line}")
            .map_err(|e| SignalPostError::Gazetteer(format!("{}: {e}", self.path.display())))?;

        info!(name = row.name, lat = row.lat, lon = row.lon, "Appended new place to gazetteer log");
        Ok(true)
    }
}
