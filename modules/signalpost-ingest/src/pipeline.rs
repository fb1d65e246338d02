//! Per-post ingestion: locate, build the record, reject duplicates, store.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use signalpost_common::{RawPost, ResolvedLocation};
use signalpost_geo::{LocationExtractor, Resolver};

use crate::record::{build_record, DedupKey};
use crate::store::RecordStore;

/// What happened to one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted { located: bool },
    Duplicate,
    /// Nothing to ingest: the post has no message text.
    SkippedEmpty,
}

pub struct IngestPipeline {
    extractor: LocationExtractor,
    resolver: Resolver,
    store: Arc<dyn RecordStore>,
}

impl IngestPipeline {
    pub fn new(extractor: LocationExtractor, resolver: Resolver, store: Arc<dyn RecordStore>) -> Self {
        Self {
            extractor,
            resolver,
            store,
        }
    }

    pub async fn process(&self, post: &RawPost) -> Result<IngestOutcome> {
        if post.message.trim().is_empty() {
            debug!("Skipping post with empty message");
            return Ok(IngestOutcome::SkippedEmpty);
        }

        let location = self.locate(post).await;
        let record = build_record(post, location.as_ref());

        let key = DedupKey::of(&record);
        if self.store.exists(&key).await? {
            debug!(place = ?record.matched_place, "Duplicate post, skipping insert");
            return Ok(IngestOutcome::Duplicate);
        }

        self.store.insert(&record).await?;
        Ok(IngestOutcome::Inserted {
            located: location.is_some(),
        })
    }

    /// A post that arrives with producer-resolved coordinates skips the
    /// cascade entirely; everything else goes extract-then-resolve.
    async fn locate(&self, post: &RawPost) -> Option<ResolvedLocation> {
        if let Some(upstream) = post.upstream_location() {
            debug!(name = %upstream.name, "Using upstream-resolved location");
            return Some(upstream);
        }
        let candidate = self.extractor.extract(&post.message).await?;
        self.resolver.resolve(&candidate.name).await.into_option()
    }
}

// --- Run statistics ---

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub received: u32,
    pub inserted: u32,
    pub located: u32,
    pub duplicates: u32,
    pub skipped: u32,
}

impl IngestStats {
    pub fn record(&mut self, outcome: IngestOutcome) {
        self.received += 1;
        match outcome {
            IngestOutcome::Inserted { located } => {
                self.inserted += 1;
                if located {
                    self.located += 1;
                }
            }
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::SkippedEmpty => self.skipped += 1,
        }
    }
}

impl std::fmt::Display for IngestStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} received, {} inserted ({} located), {} duplicates, {} skipped",
            self.received, self.inserted, self.located, self.duplicates, self.skipped
        )
    }
}
