//! Record persistence. The pipeline talks to a trait so tests run against
//! an in-memory store and `--dry-run` never needs a database.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use signalpost_common::IngestionRecord;

use crate::record::DedupKey;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether a record with this identity was already ingested.
    async fn exists(&self, key: &DedupKey) -> Result<bool>;
    async fn insert(&self, record: &IngestionRecord) -> Result<()>;
}

// --- Postgres ---

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingested_posts (
                id              BIGSERIAL PRIMARY KEY,
                time            TIMESTAMPTZ,
                total_views     BIGINT,
                message         TEXT NOT NULL,
                video_links     TEXT[] NOT NULL DEFAULT '{}',
                video_durations TEXT[] NOT NULL DEFAULT '{}',
                image_links     TEXT[] NOT NULL DEFAULT '{}',
                matched_place   TEXT,
                region_label    TEXT,
                lat             DOUBLE PRECISION,
                lon             DOUBLE PRECISION,
                ingested_at     TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS ingested_posts_identity_idx \
             ON ingested_posts (message, time, matched_place)",
        )
        .execute(&self.pool)
        .await?;
        info!("Ingestion schema ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        // IS NOT DISTINCT FROM so null time/place still participate in
        // the identity.
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM ingested_posts \
             WHERE message = $1 \
               AND time IS NOT DISTINCT FROM $2 \
               AND matched_place IS NOT DISTINCT FROM $3",
        )
        .bind(&key.message)
        .bind(key.time)
        .bind(&key.matched_place)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn insert(&self, record: &IngestionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO ingested_posts \
             (time, total_views, message, video_links, video_durations, image_links, \
              matched_place, region_label, lat, lon) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.time)
        .bind(record.total_views)
        .bind(&record.message)
        .bind(&record.video_links)
        .bind(&record.video_durations)
        .bind(&record.image_links)
        .bind(&record.matched_place)
        .bind(&record.region_label)
        .bind(record.lat)
        .bind(record.lon)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// --- In-memory (tests, dry runs) ---

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    keys: HashSet<DedupKey>,
    records: Vec<IngestionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<IngestionRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        Ok(self.lock().keys.contains(key))
    }

    async fn insert(&self, record: &IngestionRecord) -> Result<()> {
        let mut inner = self.lock();
        inner.keys.insert(DedupKey::of(record));
        inner.records.push(record.clone());
        Ok(())
    }
}
