use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Geo types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Rectangular lat/lon envelope used to validate that a resolved point
/// plausibly belongs to the region of interest. Low-confidence sources
/// (external geocoders, model estimates) are checked against it so a
/// same-named town on another continent never slips through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }

    pub fn contains_point(&self, point: GeoPoint) -> bool {
        self.contains(point.lat, point.lon)
    }
}

/// Canonical form for place-name keys: lowercased, whitespace-trimmed.
/// No stemming. Used for gazetteer, generic-region, and cache lookups.
pub fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// --- Resolution tiers ---

/// Which extraction strategy produced a candidate. Logging/debugging only,
/// never branched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    Exact,
    Generic,
    Ner,
    Fuzzy,
    Model,
}

impl std::fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionTier::Exact => write!(f, "exact"),
            ExtractionTier::Generic => write!(f, "generic"),
            ExtractionTier::Ner => write!(f, "ner"),
            ExtractionTier::Fuzzy => write!(f, "fuzzy"),
            ExtractionTier::Model => write!(f, "model"),
        }
    }
}

/// Which resolver strategy produced the coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Gazetteer,
    GenericRegion,
    Cache,
    Fuzzy,
    ExternalGeocoder,
    Model,
    /// Location arrived already resolved from upstream; nothing ran.
    Upstream,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::Gazetteer => write!(f, "gazetteer"),
            ResolutionTier::GenericRegion => write!(f, "generic_region"),
            ResolutionTier::Cache => write!(f, "cache"),
            ResolutionTier::Fuzzy => write!(f, "fuzzy"),
            ResolutionTier::ExternalGeocoder => write!(f, "external_geocoder"),
            ResolutionTier::Model => write!(f, "model"),
            ResolutionTier::Upstream => write!(f, "upstream"),
        }
    }
}

/// Transient output of the extractor, consumed immediately by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationCandidate {
    pub name: String,
    pub tier: ExtractionTier,
}

/// Resolver output, embedded into the persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    /// Canonical place name (may differ from the queried name after a
    /// fuzzy or generic match).
    pub name: String,
    pub point: GeoPoint,
    pub district: Option<String>,
    pub tier: ResolutionTier,
}

// --- Ingestion types ---

/// One unit of upstream work: a scraped post, possibly with location
/// fields already populated by the producer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPost {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_views")]
    pub total_views: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_links")]
    pub video_links: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_links")]
    pub video_durations: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_links")]
    pub image_links: Vec<String>,
    #[serde(default)]
    pub matched_city: Option<String>,
    #[serde(default)]
    pub city_result: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl RawPost {
    /// Location already resolved by the producer. When present, the
    /// extraction/resolution cascade is skipped entirely.
    pub fn upstream_location(&self) -> Option<ResolvedLocation> {
        let name = self.matched_city.as_deref()?;
        let (lat, lon) = (self.lat?, self.lon?);
        Some(ResolvedLocation {
            name: name.to_string(),
            point: GeoPoint::new(lat, lon),
            district: self.city_result.clone(),
            tier: ResolutionTier::Upstream,
        })
    }
}

/// View counts arrive as a number, or as the scraper's display string
/// ("1.2K", "3M", "1,204"). Unparseable values become `None` rather than
/// failing the whole post.
fn deserialize_views<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => parse_view_count(&s),
        _ => None,
    })
}

/// Parse a human-formatted view count. Suffixes K/M/B scale, commas are
/// thousands separators.
pub fn parse_view_count(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    let (digits, scale) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = digits.trim().parse().ok()?;
    Some((value * scale).round() as i64)
}

/// Handle link fields arriving as either a JSON array or the producer's
/// legacy pipe-delimited string.
fn deserialize_links<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) if !s.trim().is_empty() => {
                    Some(s.trim().to_string())
                }
                _ => None,
            })
            .collect()),
        serde_json::Value::String(s) => Ok(s
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()),
        _ => Err(de::Error::custom(
            "link field must be an array, string, or null",
        )),
    }
}

/// The unit persisted to storage. Write-once; duplicates are rejected on
/// (message, time, matched_place).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub time: Option<DateTime<Utc>>,
    pub total_views: Option<i64>,
    pub message: String,
    pub video_links: Vec<String>,
    pub video_durations: Vec<String>,
    pub image_links: Vec<String>,
    pub matched_place: Option<String>,
    pub region_label: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}
