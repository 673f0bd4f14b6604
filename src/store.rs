//! SQLite-backed store for raw items and digests: the single source of truth
//! for "has this been processed".
//!
//! Every write is its own statement, so a mix of outcomes within one stage
//! commits item by item and a crash mid-batch never rolls back earlier items.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;
use tracing::debug;

use crate::types::{Digest, ItemKey, RawItem, SourceKind, UNAVAILABLE};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    source_kind: String,
    natural_id: String,
    title: String,
    url: String,
    description: String,
    category: Option<String>,
    published_at: DateTime<Utc>,
    derived_content: Option<String>,
}

impl ItemRow {
    fn into_item(self) -> Result<RawItem, StoreError> {
        let kind: SourceKind = self
            .source_kind
            .parse()
            .map_err(StoreError::CorruptRow)?;
        Ok(RawItem {
            kind,
            natural_id: self.natural_id,
            title: self.title,
            url: self.url,
            description: self.description,
            category: self.category,
            published_at: self.published_at,
            derived_content: self.derived_content,
        })
    }
}

impl ItemStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert candidates that are not yet in the store. Within the batch,
    /// first-seen-wins in the given order; candidates already persisted are
    /// dropped silently, since re-scraping the same window is expected and
    /// idempotent. Returns how many rows were actually inserted.
    pub async fn insert_new(&self, batch: &[RawItem]) -> Result<usize, StoreError> {
        let mut seen: HashSet<ItemKey> = HashSet::with_capacity(batch.len());
        let mut inserted = 0_usize;

        for item in batch {
            if !seen.insert(item.key()) {
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO items (source_kind, natural_id, title, url, description, category, published_at, derived_content)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(source_kind, natural_id) DO NOTHING
                "#,
            )
            .bind(item.kind.as_str())
            .bind(&item.natural_id)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.description)
            .bind(&item.category)
            .bind(item.published_at)
            .bind(&item.derived_content)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            } else {
                debug!(item = %item.key(), "already stored, skipping");
            }
        }

        Ok(inserted)
    }

    /// Every persisted item of `kind` whose derived content is still unset,
    /// regardless of when it was ingested. A crashed run leaves items here
    /// and the next run picks them up with no special recovery logic.
    pub async fn items_missing_content(
        &self,
        kind: SourceKind,
    ) -> Result<Vec<RawItem>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT source_kind, natural_id, title, url, description, category, published_at, derived_content
            FROM items
            WHERE source_kind = ?1 AND derived_content IS NULL
            ORDER BY published_at
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    /// Fill an item's derived content. Guarded so it happens at most once;
    /// returns whether the row was actually updated.
    pub async fn set_derived_content(
        &self,
        key: &ItemKey,
        content: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET derived_content = ?1
            WHERE source_kind = ?2 AND natural_id = ?3 AND derived_content IS NULL
            "#,
        )
        .bind(content)
        .bind(key.kind.as_str())
        .bind(&key.natural_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark that enrichment ran and the source definitively has no content.
    pub async fn mark_unavailable(&self, key: &ItemKey) -> Result<bool, StoreError> {
        self.set_derived_content(key, UNAVAILABLE).await
    }

    /// Items in a terminal enrichment state that do not have a digest yet.
    /// Excludes sentinel items with nothing to fall back on. Computed as an
    /// anti-join on the encoded digest id rather than per-item existence
    /// queries.
    pub async fn items_awaiting_digest(&self) -> Result<Vec<RawItem>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT i.source_kind, i.natural_id, i.title, i.url, i.description, i.category, i.published_at, i.derived_content
            FROM items i
            LEFT JOIN digests d ON d.id = i.source_kind || ':' || i.natural_id
            WHERE d.id IS NULL
              AND i.derived_content IS NOT NULL
              AND NOT (i.derived_content = ?1 AND i.description = '')
            ORDER BY i.published_at
            "#,
        )
        .bind(UNAVAILABLE)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    /// Create a digest under its deterministic id. A second create for the
    /// same item is a no-op; returns whether a row was inserted.
    pub async fn insert_digest(&self, digest: &Digest) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO digests (id, title, summary, source_url, source_title, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&digest.id)
        .bind(&digest.title)
        .bind(&digest.summary)
        .bind(&digest.source_url)
        .bind(&digest.source_title)
        .bind(digest.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Digests whose content recency falls inside the trailing window.
    pub async fn recent_digests(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Digest>, StoreError> {
        #[derive(FromRow)]
        struct DigestRow {
            id: String,
            title: String,
            summary: String,
            source_url: String,
            source_title: String,
            created_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, DigestRow>(
            r#"
            SELECT id, title, summary, source_url, source_title, created_at
            FROM digests
            WHERE created_at >= ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Digest {
                id: r.id,
                title: r.title,
                summary: r.summary,
                source_url: r.source_url,
                source_title: r.source_title,
                created_at: r.created_at,
            })
            .collect())
    }

    pub async fn count_items(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_digests(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM digests")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
