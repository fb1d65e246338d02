pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::SignalPostError;
pub use types::{
    normalize_key, BoundingBox, ExtractionTier, GeoPoint, IngestionRecord, LocationCandidate,
    RawPost, ResolutionTier, ResolvedLocation,
};
