//! Generic-region fallback table: broad area names mapped to a
//! representative centroid, used when no specific locality is named.
//! Static and never mutated at runtime.

use signalpost_common::GeoPoint;

pub struct GenericRegion {
    pub key: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl GenericRegion {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

pub const GENERIC_REGIONS: &[GenericRegion] = &[
    GenericRegion { key: "gaza", name: "Gaza", lat: 31.5, lon: 34.5 },
    GenericRegion { key: "gaza strip", name: "Gaza", lat: 31.5, lon: 34.5 },
    GenericRegion { key: "west bank", name: "West Bank", lat: 31.95, lon: 35.2 },
    GenericRegion { key: "occupied territories", name: "Occupied Territories", lat: 31.95, lon: 35.0 },
];

/// Lookup by normalized key.
pub fn lookup(key: &str) -> Option<&'static GenericRegion> {
    GENERIC_REGIONS.iter().find(|r| r.key == key)
}
