//! Cascade behavior of the resolver: tier ordering, caching (positive and
//! negative), bounds rejection, and the append log, exercised against
//! counting stub services so every remote call is observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use signalpost_common::config::DEFAULT_BOUNDS;
use signalpost_common::{GeoPoint, ResolutionTier};
use signalpost_geo::{
    ForwardGeocoder, Gazetteer, GazetteerAppendLog, GazetteerEntry, GeocodeCache, LocationModel,
    Resolution, Resolver,
};

// --- Stubs ---

#[derive(Default)]
struct StubGeocoder {
    reply: Option<GeoPoint>,
    fail: bool,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl ForwardGeocoder for StubGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.reply)
    }
}

#[derive(Default)]
struct StubModel {
    coords: Option<GeoPoint>,
    calls: AtomicUsize,
}

#[async_trait]
impl LocationModel for StubModel {
    async fn extract_place(&self, _text: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn estimate_coords(&self, _place: &str) -> Result<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.coords)
    }
}

// --- Fixtures ---

fn entry(name: &str, lat: f64, lon: f64, district: Option<&str>) -> GazetteerEntry {
    GazetteerEntry {
        name: name.to_string(),
        lat,
        lon,
        district: district.map(str::to_string),
        place_type: None,
        native_name: None,
    }
}

fn sample_gazetteer() -> Arc<Gazetteer> {
    let mut gaz = Gazetteer::empty();
    gaz.insert(entry("Jenin", 32.46, 35.30, Some("Jenin")));
    gaz.insert(entry("Kufr Qaddum", 32.22, 35.14, Some("Qalqilya")));
    Arc::new(gaz)
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn cache_path(&self) -> std::path::PathBuf {
        self.dir.path().join("geocode_cache.json")
    }

    fn cache(&self) -> GeocodeCache {
        GeocodeCache::load(self.cache_path())
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            sample_gazetteer(),
            self.cache(),
            DEFAULT_BOUNDS,
            85,
            "Palestine",
        )
    }
}

fn resolved(resolution: Resolution) -> signalpost_common::ResolvedLocation {
    resolution.into_option().expect("expected a resolved location")
}

// --- Tier ordering ---

#[tokio::test]
async fn gazetteer_hit_touches_nothing_else() {
    let fixture = Fixture::new();
    let geocoder = Arc::new(StubGeocoder::default());
    let model = Arc::new(StubModel::default());
    let resolver = fixture
        .resolver()
        .with_geocoder(geocoder.clone())
        .with_model(model.clone());

    let location = resolved(resolver.resolve("Jenin").await);
    assert_eq!(location.point, GeoPoint::new(32.46, 35.30));
    assert_eq!(location.district.as_deref(), Some("Jenin"));
    assert_eq!(location.tier, ResolutionTier::Gazetteer);

    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    // No cache mutation either: the file was never written.
    assert!(!fixture.cache_path().exists());
}

#[tokio::test]
async fn generic_region_hit() {
    let fixture = Fixture::new();
    let location = resolved(fixture.resolver().resolve("occupied territories").await);
    assert_eq!(location.point, GeoPoint::new(31.95, 35.0));
    assert_eq!(location.name, "Occupied Territories");
    assert_eq!(location.tier, ResolutionTier::GenericRegion);
}

#[tokio::test]
async fn fuzzy_hit_is_cached() {
    let fixture = Fixture::new();
    let resolver = fixture.resolver();

    let location = resolved(resolver.resolve("kufr qadum").await);
    assert_eq!(location.name, "Kufr Qaddum");
    assert_eq!(location.tier, ResolutionTier::Fuzzy);

    // Second resolve on a fresh resolver reads the persisted cache.
    let resolver = fixture.resolver();
    let location = resolved(resolver.resolve("kufr qadum").await);
    assert_eq!(location.point, GeoPoint::new(32.22, 35.14));
    assert_eq!(location.tier, ResolutionTier::Cache);
}

// --- Caching ---

#[tokio::test]
async fn second_resolve_hits_cache_not_network() {
    let fixture = Fixture::new();
    let geocoder = Arc::new(StubGeocoder {
        reply: Some(GeoPoint::new(31.52, 34.45)),
        ..Default::default()
    });
    let resolver = fixture.resolver().with_geocoder(geocoder.clone());

    let first = resolved(resolver.resolve("Deir Sharaf").await);
    assert_eq!(first.tier, ResolutionTier::ExternalGeocoder);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    let second = resolved(resolver.resolve("Deir Sharaf").await);
    assert_eq!(second.tier, ResolutionTier::Cache);
    assert_eq!(second.point, first.point);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1, "no second call");
}

#[tokio::test]
async fn cached_negative_short_circuits() {
    let fixture = Fixture::new();
    {
        let mut cache = fixture.cache();
        cache.put("al-quds", None);
    }
    let geocoder = Arc::new(StubGeocoder {
        reply: Some(GeoPoint::new(31.78, 35.22)),
        ..Default::default()
    });
    let model = Arc::new(StubModel {
        coords: Some(GeoPoint::new(31.78, 35.22)),
        ..Default::default()
    });
    let resolver = fixture
        .resolver()
        .with_geocoder(geocoder.clone())
        .with_model(model.clone());

    assert_eq!(resolver.resolve("Al-Quds").await, Resolution::Unresolved);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausted_cascade_caches_a_negative() {
    let fixture = Fixture::new();
    let geocoder = Arc::new(StubGeocoder::default()); // always empty
    let resolver = fixture.resolver().with_geocoder(geocoder.clone());

    assert_eq!(resolver.resolve("nowhere land").await, Resolution::Unresolved);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

    // Re-resolving never retries the remote tier.
    assert_eq!(resolver.resolve("nowhere land").await, Resolution::Unresolved);
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
}

// --- Bounds validation ---

#[tokio::test]
async fn out_of_bounds_geocoder_result_falls_through() {
    let fixture = Fixture::new();
    // A same-named town on another continent.
    let geocoder = Arc::new(StubGeocoder {
        reply: Some(GeoPoint::new(52.52, 13.40)),
        ..Default::default()
    });
    let model = Arc::new(StubModel {
        coords: Some(GeoPoint::new(31.52, 34.45)),
        ..Default::default()
    });
    let resolver = fixture
        .resolver()
        .with_geocoder(geocoder.clone())
        .with_model(model.clone());

    let location = resolved(resolver.resolve("Deir Sharaf").await);
    assert_eq!(location.tier, ResolutionTier::Model);
    assert_eq!(location.point, GeoPoint::new(31.52, 34.45));
    assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_bounds_model_estimate_is_unresolved() {
    let fixture = Fixture::new();
    let model = Arc::new(StubModel {
        coords: Some(GeoPoint::new(48.85, 2.35)),
        ..Default::default()
    });
    let resolver = fixture.resolver().with_model(model);

    assert_eq!(resolver.resolve("Paris Street").await, Resolution::Unresolved);
}

// --- Tier failure resilience ---

#[tokio::test]
async fn geocoder_error_falls_through_to_model() {
    let fixture = Fixture::new();
    let geocoder = Arc::new(StubGeocoder {
        fail: true,
        ..Default::default()
    });
    let model = Arc::new(StubModel {
        coords: Some(GeoPoint::new(31.52, 34.45)),
        ..Default::default()
    });
    let resolver = fixture
        .resolver()
        .with_geocoder(geocoder)
        .with_model(model.clone());

    let location = resolved(resolver.resolve("Deir Sharaf").await);
    assert_eq!(location.tier, ResolutionTier::Model);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

// --- Query shaping and append log ---

#[tokio::test]
async fn geocoder_query_carries_region_suffix() {
    let fixture = Fixture::new();
    let geocoder = Arc::new(StubGeocoder::default());
    let resolver = fixture.resolver().with_geocoder(geocoder.clone());

    let _ = resolver.resolve("Deir Sharaf").await;
    let queries = geocoder.queries.lock().unwrap();
    assert_eq!(queries.as_slice(), ["Deir Sharaf, Palestine"]);
}

#[tokio::test]
async fn model_hit_feeds_the_append_log_once() {
    let fixture = Fixture::new();
    let log_path = fixture.dir.path().join("append.ndjson");
    let model = Arc::new(StubModel {
        coords: Some(GeoPoint::new(31.52, 34.45)),
        ..Default::default()
    });
    let resolver = fixture
        .resolver()
        .with_model(model.clone())
        .with_append_log(GazetteerAppendLog::new(&log_path));

    let location = resolved(resolver.resolve("Deir Sharaf").await);
    assert_eq!(location.tier, ResolutionTier::Model);

    let raw = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(raw.lines().count(), 1);
    assert!(raw.contains("Deir Sharaf"));

    // Same name again resolves from cache; the log is untouched.
    let location = resolved(resolver.resolve("deir sharaf").await);
    assert_eq!(location.tier, ResolutionTier::Cache);
    let raw = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(raw.lines().count(), 1);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_name_is_unresolved_without_caching() {
    let fixture = Fixture::new();
    let resolver = fixture.resolver();
    assert_eq!(resolver.resolve("   ").await, Resolution::Unresolved);
    assert!(!fixture.cache_path().exists());
}
