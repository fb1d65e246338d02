//! Builds the persisted record from a raw post and its (possibly absent)
//! resolved location, and defines the key duplicates are rejected on.

use chrono::{DateTime, Utc};

use signalpost_common::{IngestionRecord, RawPost, ResolvedLocation};

/// Stored message length cap, in characters. Long posts are clipped; the
/// full text stays with the upstream scrape.
pub const TEXT_LIMIT: usize = 250;

/// Clip to at most [`TEXT_LIMIT`] characters, never splitting a code point.
pub fn truncate_message(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(TEXT_LIMIT) {
        Some((byte_index, _)) => trimmed[..byte_index].to_string(),
        None => trimmed.to_string(),
    }
}

/// Identity of a record for duplicate rejection: same (clipped) message at
/// the same time for the same place is the same event re-scraped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub message: String,
    pub time: Option<DateTime<Utc>>,
    pub matched_place: Option<String>,
}

impl DedupKey {
    pub fn of(record: &IngestionRecord) -> Self {
        Self {
            message: record.message.clone(),
            time: record.time,
            matched_place: record.matched_place.clone(),
        }
    }
}

/// Assemble the record to persist. `location` is whatever the resolution
/// cascade produced; an unlocated post is still recorded, with empty
/// place fields.
pub fn build_record(post: &RawPost, location: Option<&ResolvedLocation>) -> IngestionRecord {
    IngestionRecord {
        time: post.time,
        total_views: post.total_views,
        message: truncate_message(&post.message),
        video_links: post.video_links.clone(),
        video_durations: post.video_durations.clone(),
        image_links: post.image_links.clone(),
        matched_place: location.map(|l| l.name.clone()),
        region_label: location.and_then(|l| l.district.clone()),
        lat: location.map(|l| l.point.lat),
        lon: location.map(|l| l.point.lon),
    }
}
