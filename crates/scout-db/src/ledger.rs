use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;

use scout_core::error::AppError;
use scout_core::models::{Listing, Run};

/// SQLite-backed persistence ledger.
///
/// Every write is awaited to durability before returning; the
/// orchestrator relies on this to keep the at-most-once-delivery
/// window limited to a crash between the delivery call and the
/// following upsert.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn seen(&self, identity: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE identity = ?1")
            .bind(identity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert a listing, or refresh every non-key field except
    /// `found_at` (the timestamp of first processing) on conflict.
    pub async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO listings
                (identity, source, title, organization, url, compensation,
                 description, posted_at, raw, found_at, sent_at, filtered_reason)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(identity) DO UPDATE SET
                title = excluded.title,
                organization = excluded.organization,
                url = excluded.url,
                compensation = excluded.compensation,
                description = excluded.description,
                posted_at = excluded.posted_at,
                raw = excluded.raw,
                sent_at = excluded.sent_at,
                filtered_reason = excluded.filtered_reason
            "#,
        )
        .bind(&listing.identity)
        .bind(&listing.source)
        .bind(&listing.title)
        .bind(&listing.organization)
        .bind(&listing.url)
        .bind(&listing.compensation)
        .bind(&listing.description)
        .bind(&listing.posted_at)
        .bind(Json(&listing.raw))
        .bind(listing.found_at)
        .bind(listing.sent_at)
        .bind(&listing.filtered_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn get_listing(&self, identity: &str) -> Result<Option<Listing>, AppError> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            SELECT identity, source, title, organization, url, compensation,
                   description, posted_at, raw, found_at, sent_at, filtered_reason
            FROM listings
            WHERE identity = ?1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn insert_run(&self, run: &Run) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, started_at, finished_at, found_count, sent_count, error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&run.id)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.found_count)
        .bind(run.sent_count)
        .bind(&run.error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    pub async fn update_run(&self, run: &Run) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE runs
            SET finished_at = ?2, found_count = ?3, sent_count = ?4, error = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&run.id)
        .bind(run.finished_at)
        .bind(run.found_count)
        .bind(run.sent_count)
        .bind(&run.error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(format!(
                "unknown run id: {}",
                run.id
            )));
        }
        Ok(())
    }

    /// Most recent runs, newest first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<Run>, AppError> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, started_at, finished_at, found_count, sent_count, error
            FROM runs
            ORDER BY started_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ListingRow {
    identity: String,
    source: String,
    title: String,
    organization: String,
    url: String,
    compensation: String,
    description: String,
    posted_at: Option<String>,
    raw: Json<serde_json::Value>,
    found_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    filtered_reason: Option<String>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Listing {
            identity: row.identity,
            source: row.source,
            title: row.title,
            organization: row.organization,
            url: row.url,
            compensation: row.compensation,
            description: row.description,
            posted_at: row.posted_at,
            raw: row.raw.0,
            found_at: row.found_at,
            sent_at: row.sent_at,
            filtered_reason: row.filtered_reason,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    found_count: i64,
    sent_count: i64,
    error: Option<String>,
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        Run {
            id: row.id,
            started_at: row.started_at,
            finished_at: row.finished_at,
            found_count: row.found_count,
            sent_count: row.sent_count,
            error: row.error,
        }
    }
}

// -- Trait implementation --

impl scout_core::traits::Ledger for LedgerRepository {
    async fn seen(&self, identity: &str) -> Result<bool, AppError> {
        LedgerRepository::seen(self, identity).await
    }

    async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        LedgerRepository::upsert_listing(self, listing).await
    }

    async fn get_listing(&self, identity: &str) -> Result<Option<Listing>, AppError> {
        LedgerRepository::get_listing(self, identity).await
    }

    async fn insert_run(&self, run: &Run) -> Result<(), AppError> {
        LedgerRepository::insert_run(self, run).await
    }

    async fn update_run(&self, run: &Run) -> Result<(), AppError> {
        LedgerRepository::update_run(self, run).await
    }
}
