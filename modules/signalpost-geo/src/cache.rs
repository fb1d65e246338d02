//! Persistent geocode cache: normalized name -> coordinates, or an
//! explicit null for names that previously failed to resolve. Negative
//! entries keep known-bad names from hitting the network on every run
//! while staying retryable via a deliberate cache clear.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use signalpost_common::{normalize_key, GeoPoint, SignalPostError};

/// Three-way lookup result: callers must distinguish a cache miss (never
/// attempted) from a cached failure (attempted and known unresolvable).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup {
    Miss,
    Hit(GeoPoint),
    Negative,
}

/// Whole-file JSON cache, read fully into memory at startup and rewritten
/// atomically (temp file + rename) on every mutating `put`.
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, Option<GeoPoint>>,
}

impl GeocodeCache {
    /// Load the cache file. A missing or unreadable file starts an empty
    /// cache; the pipeline runs without memoization until the first flush.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, Option<[f64; 2]>>>(&raw) {
                Ok(parsed) => {
                    let entries: HashMap<String, Option<GeoPoint>> = parsed
                        .into_iter()
                        .map(|(k, v)| (k, v.map(|[lat, lon]| GeoPoint::new(lat, lon))))
                        .collect();
                    info!(entries = entries.len(), "Geocode cache loaded");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Geocode cache unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> CacheLookup {
        match self.entries.get(&normalize_key(name)) {
            None => CacheLookup::Miss,
            Some(None) => CacheLookup::Negative,
            Some(Some(point)) => CacheLookup::Hit(*point),
        }
    }

    /// Record a resolution result (`None` = resolution failed) and persist.
    /// A `put` that does not change state skips the disk write. Flush
    /// failures are logged, not propagated: the in-memory cache keeps
    /// serving the process.
    pub fn put(&mut self, name: &str, value: Option<GeoPoint>) {
        let key = normalize_key(name);
        if self.entries.get(&key) == Some(&value) {
            return;
        }
        self.entries.insert(key, value);
        if let Err(e) = self.flush() {
            error!(path = %self.path.display(), error = %e, "Failed to persist geocode cache");
        }
    }

    /// Rewrite the cache file atomically: serialize to a temp file next to
    /// the target, then rename over it, so a crash mid-save never leaves a
    /// truncated cache behind.
    pub fn flush(&self) -> Result<(), SignalPostError> {
        let wire: HashMap<&str, Option<[f64; 2]>> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.map(|p| [p.lat, p.lon])))
            .collect();
        let raw = serde_json::to_string_pretty(&wire)
            .map_err(|e| SignalPostError::Cache(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| SignalPostError::Cache(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| SignalPostError::Cache(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_in(dir: &tempfile::TempDir) -> GeocodeCache {
        GeocodeCache::load(dir.path().join("geocode_cache.json"))
    }

    #[test]
    fn miss_negative_and_hit_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        assert_eq!(cache.get("al-quds"), CacheLookup::Miss);
        cache.put("al-quds", None);
        assert_eq!(cache.get("al-quds"), CacheLookup::Negative);
        cache.put("al-quds", Some(GeoPoint::new(31.78, 35.22)));
        assert_eq!(
            cache.get("al-quds"),
            CacheLookup::Hit(GeoPoint::new(31.78, 35.22))
        );
    }

    #[test]
    fn keys_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        cache.put("  Khan Younis ", Some(GeoPoint::new(31.34, 34.30)));
        assert!(matches!(cache.get("khan younis"), CacheLookup::Hit(_)));
        assert!(matches!(cache.get("KHAN YOUNIS"), CacheLookup::Hit(_)));
    }

    #[test]
    fn round_trip_preserves_entries_including_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        {
            let mut cache = GeocodeCache::load(&path);
            cache.put("jenin", Some(GeoPoint::new(32.46, 35.30)));
            cache.put("rafah", Some(GeoPoint::new(31.29, 34.25)));
            cache.put("atlantis", None);
        }
        let reloaded = GeocodeCache::load(&path);
        assert_eq!(reloaded.len(), 3);
        assert_eq!(
            reloaded.get("jenin"),
            CacheLookup::Hit(GeoPoint::new(32.46, 35.30))
        );
        assert_eq!(reloaded.get("atlantis"), CacheLookup::Negative);
    }

    #[test]
    fn unchanged_put_skips_the_disk_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        let mut cache = GeocodeCache::load(&path);
        cache.put("jenin", Some(GeoPoint::new(32.46, 35.30)));
        assert!(path.exists());

        // Remove the file behind the cache's back; an identical put must
        // not recreate it.
        fs::remove_file(&path).unwrap();
        cache.put("jenin", Some(GeoPoint::new(32.46, 35.30)));
        assert!(!path.exists());

        // A changed value writes again.
        cache.put("jenin", None);
        assert!(path.exists());
    }

    #[test]
    fn corrupt_cache_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        fs::write(&path, "{ this is not json").unwrap();
        let cache = GeocodeCache::load(&path);
        assert!(cache.is_empty());
    }
}
