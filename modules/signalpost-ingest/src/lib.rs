//! Ingestion pipeline: raw scraped posts in, located, deduplicated
//! records in storage.

pub mod pipeline;
pub mod record;
pub mod source;
pub mod store;

pub use pipeline::{IngestOutcome, IngestPipeline, IngestStats};
pub use record::{build_record, truncate_message, DedupKey, TEXT_LIMIT};
pub use store::{MemoryStore, PgRecordStore, RecordStore};
