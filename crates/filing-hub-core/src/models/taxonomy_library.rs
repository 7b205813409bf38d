use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::taxonomy_libraries;

/// Total acquisition attempts allowed per library before it is terminally
/// failed and surfaced for manual download.
pub const MAX_TOTAL_ATTEMPTS: i32 = 6;

/// Name/version placeholder that must never reach the database.
pub const UNKNOWN: &str = "unknown";

/// A taxonomy library required by one or more filings.
///
/// `taxonomy_namespace` is globally unique; so is `(taxonomy_name,
/// taxonomy_version)`. A row whose `download_status` is `completed` points at
/// a directory that exists and holds more files than the configured
/// threshold.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = taxonomy_libraries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaxonomyLibrary {
    pub library_id: Uuid,
    pub taxonomy_name: String,
    pub taxonomy_version: String,
    pub taxonomy_namespace: String,
    pub source_url: String,
    pub current_url: String,
    pub download_status: String,
    pub library_directory: Option<String>,
    pub total_files: Option<i32>,
    pub download_attempts: i32,
    pub extraction_attempts: i32,
    pub total_attempts: i32,
    pub failure_stage: Option<String>,
    pub failure_reason: Option<String>,
    pub error_message: Option<String>,
    pub alternative_urls_tried: serde_json::Value,
    pub required_by_filings: serde_json::Value,
    pub download_completed_at: Option<DateTime<Utc>>,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub is_terminal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New taxonomy library row for insertion
#[derive(Debug, Clone, Insertable, Validate, Deserialize)]
#[diesel(table_name = taxonomy_libraries)]
pub struct NewTaxonomyLibrary {
    #[validate(length(min = 1, max = 100))]
    pub taxonomy_name: String,
    #[validate(length(min = 1, max = 50))]
    pub taxonomy_version: String,
    #[validate(length(min = 1))]
    pub taxonomy_namespace: String,
    pub source_url: String,
    pub current_url: String,
    pub download_status: String,
    pub alternative_urls_tried: serde_json::Value,
    pub required_by_filings: serde_json::Value,
}

/// Outcome of a taxonomy upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomySaveOutcome {
    pub saved: bool,
    pub skipped: bool,
    pub created: bool,
}

impl NewTaxonomyLibrary {
    pub fn pending(
        name: &str,
        version: &str,
        namespace: &str,
        source_url: &str,
        required_by_filing: Option<Uuid>,
    ) -> Self {
        let required = match required_by_filing {
            Some(id) => serde_json::json!([id.to_string()]),
            None => serde_json::json!([]),
        };

        Self {
            taxonomy_name: name.to_string(),
            taxonomy_version: version.to_string(),
            taxonomy_namespace: namespace.to_string(),
            source_url: source_url.to_string(),
            current_url: source_url.to_string(),
            download_status: "pending".to_string(),
            alternative_urls_tried: serde_json::json!([]),
            required_by_filings: required,
        }
    }

    /// Placeholder rows are rejected, not persisted
    pub fn is_unknown(&self) -> bool {
        self.taxonomy_name == UNKNOWN || self.taxonomy_version == UNKNOWN
    }
}

impl TaxonomyLibrary {
    /// Insert or update a taxonomy library row.
    ///
    /// Looks up the row by its unique namespace. When it already exists, the
    /// `required_by_filing` (if supplied) is appended to the dependency list;
    /// otherwise a fresh `pending` row is created. Rows with a name or
    /// version of `unknown` are skipped with a no-op success.
    pub async fn upsert(
        pool: &crate::database::DatabasePool,
        new_library: &NewTaxonomyLibrary,
        required_by_filing: Option<Uuid>,
    ) -> crate::error::AppResult<TaxonomySaveOutcome> {
        use crate::schema::taxonomy_libraries::dsl;

        if new_library.is_unknown() {
            tracing::warn!(
                "Skipping taxonomy with unknown name/version: {}",
                new_library.taxonomy_namespace
            );
            return Ok(TaxonomySaveOutcome {
                saved: false,
                skipped: true,
                created: false,
            });
        }

        new_library.validate()?;

        let mut conn = pool.get().await?;

        let existing = dsl::taxonomy_libraries
            .filter(dsl::taxonomy_namespace.eq(&new_library.taxonomy_namespace))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        if let Some(existing) = existing {
            if let Some(filing_id) = required_by_filing {
                let mut required = existing.required_by_filing_ids();
                let filing_id = filing_id.to_string();
                if !required.contains(&filing_id) {
                    required.push(filing_id);

                    diesel::update(
                        dsl::taxonomy_libraries.filter(dsl::library_id.eq(existing.library_id)),
                    )
                    .set((
                        dsl::required_by_filings.eq(serde_json::json!(required)),
                        dsl::updated_at.eq(Utc::now()),
                    ))
                    .execute(&mut conn)
                    .await?;
                }
            }

            return Ok(TaxonomySaveOutcome {
                saved: true,
                skipped: false,
                created: false,
            });
        }

        let mut to_insert = new_library.clone();
        if let Some(filing_id) = required_by_filing {
            to_insert.required_by_filings = serde_json::json!([filing_id.to_string()]);
        }

        diesel::insert_into(dsl::taxonomy_libraries)
            .values(&to_insert)
            .on_conflict(dsl::taxonomy_namespace)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(TaxonomySaveOutcome {
            saved: true,
            skipped: false,
            created: true,
        })
    }

    pub async fn find_by_id(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let library = dsl::taxonomy_libraries
            .filter(dsl::library_id.eq(library_id))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(library)
    }

    pub async fn find_by_name_version(
        pool: &crate::database::DatabasePool,
        name: &str,
        version: &str,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let library = dsl::taxonomy_libraries
            .filter(dsl::taxonomy_name.eq(name))
            .filter(dsl::taxonomy_version.eq(version))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(library)
    }

    /// Downloadable rows (`pending` or `failed`), failed first. Terminally
    /// failed libraries never re-enter the queue.
    pub async fn get_downloadable(
        pool: &crate::database::DatabasePool,
        limit: i64,
    ) -> crate::error::AppResult<Vec<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let rows = dsl::taxonomy_libraries
            .filter(dsl::download_status.eq_any(vec!["pending", "failed"]))
            .filter(dsl::is_terminal.eq(false))
            .order((dsl::download_status.asc(), dsl::created_at.asc()))
            .limit(limit)
            .load::<Self>(&mut conn)
            .await?;

        Ok(rows)
    }

    /// List all libraries, newest first
    pub async fn list_all(
        pool: &crate::database::DatabasePool,
    ) -> crate::error::AppResult<Vec<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let rows = dsl::taxonomy_libraries
            .order(dsl::created_at.desc())
            .load::<Self>(&mut conn)
            .await?;

        Ok(rows)
    }

    /// Atomically claim a row for download (same ownership rule as filings)
    pub async fn claim_for_download(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
    ) -> crate::error::AppResult<bool> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let updated = diesel::update(
            dsl::taxonomy_libraries
                .filter(dsl::library_id.eq(library_id))
                .filter(dsl::download_status.eq_any(vec!["pending", "failed"]))
                .filter(dsl::is_terminal.eq(false)),
        )
        .set((
            dsl::download_status.eq("downloading"),
            dsl::download_attempts.eq(dsl::download_attempts + 1),
            dsl::total_attempts.eq(dsl::total_attempts + 1),
            dsl::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated == 1)
    }

    /// Record completion after on-disk verification
    pub async fn mark_completed(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
        library_directory: &str,
        total_files: i32,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;
        let now = Utc::now();

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set((
                dsl::download_status.eq("completed"),
                dsl::library_directory.eq(library_directory),
                dsl::total_files.eq(total_files),
                dsl::download_completed_at.eq(now),
                dsl::last_verified_at.eq(now),
                dsl::failure_stage.eq(None::<String>),
                dsl::failure_reason.eq(None::<String>),
                dsl::error_message.eq(None::<String>),
                dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Record a failure with its stage and reason code.
    ///
    /// Extraction-stage failures bump the extraction counter; every failure
    /// bumps the total. Crossing `MAX_TOTAL_ATTEMPTS` marks the row terminal.
    pub async fn mark_failed(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
        failure_stage: &str,
        failure_reason: &str,
        error_message: &str,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let library = dsl::taxonomy_libraries
            .filter(dsl::library_id.eq(library_id))
            .first::<Self>(&mut conn)
            .await?;

        let extraction_bump = if failure_stage == "extraction" { 1 } else { 0 };
        let terminal = library.total_attempts >= MAX_TOTAL_ATTEMPTS;

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set((
                dsl::download_status.eq("failed"),
                dsl::extraction_attempts.eq(library.extraction_attempts + extraction_bump),
                dsl::failure_stage.eq(failure_stage),
                dsl::failure_reason.eq(failure_reason),
                dsl::error_message.eq(error_message),
                dsl::is_terminal.eq(terminal),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Swap to an alternative URL and requeue for the coordinator.
    ///
    /// The URL being abandoned is appended to `alternative_urls_tried`.
    pub async fn switch_to_alternative_url(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
        new_url: &str,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let library = dsl::taxonomy_libraries
            .filter(dsl::library_id.eq(library_id))
            .first::<Self>(&mut conn)
            .await?;

        let mut tried = library.urls_tried();
        if !library.current_url.is_empty() && !tried.contains(&library.current_url) {
            tried.push(library.current_url.clone());
        }

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set((
                dsl::current_url.eq(new_url),
                dsl::alternative_urls_tried.eq(serde_json::json!(tried)),
                dsl::download_status.eq("pending"),
                dsl::failure_stage.eq(None::<String>),
                dsl::failure_reason.eq(None::<String>),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Reset a failed row to `pending` so the coordinator retries the same
    /// URL. Failure fields are cleared; attempt counters are not.
    pub async fn requeue_pending(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set((
                dsl::download_status.eq("pending"),
                dsl::failure_stage.eq(None::<String>),
                dsl::failure_reason.eq(None::<String>),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Requeue a row for download after reconciliation found its directory
    /// gone. The only sanctioned completed -> non-ready transition.
    pub async fn mark_missing(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set((
                dsl::download_status.eq("pending"),
                dsl::library_directory.eq(None::<String>),
                dsl::total_files.eq(None::<i32>),
                dsl::download_completed_at.eq(None::<DateTime<Utc>>),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Register a library discovered on disk but absent (or not ready) in the
    /// database. Inserts or updates the row as completed with the observed
    /// file count.
    pub async fn register_found(
        pool: &crate::database::DatabasePool,
        new_library: &NewTaxonomyLibrary,
        library_directory: &str,
        total_files: i32,
    ) -> crate::error::AppResult<()> {
        let outcome = Self::upsert(pool, new_library, None).await?;
        if outcome.skipped {
            return Ok(());
        }

        let library = Self::find_by_name_version(
            pool,
            &new_library.taxonomy_name,
            &new_library.taxonomy_version,
        )
        .await?
        .ok_or_else(|| crate::error::AppError::not_found("Taxonomy library"))?;

        Self::mark_completed(pool, library.library_id, library_directory, total_files).await
    }

    /// Refresh `last_verified_at` after a dual verification pass
    pub async fn touch_verified(
        pool: &crate::database::DatabasePool,
        library_id: Uuid,
    ) -> crate::error::AppResult<()> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        diesel::update(dsl::taxonomy_libraries.filter(dsl::library_id.eq(library_id)))
            .set(dsl::last_verified_at.eq(Utc::now()))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Failed rows that still have attempts left
    pub async fn get_retry_candidates(
        pool: &crate::database::DatabasePool,
    ) -> crate::error::AppResult<Vec<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let rows = dsl::taxonomy_libraries
            .filter(dsl::download_status.eq("failed"))
            .filter(dsl::is_terminal.eq(false))
            .filter(dsl::total_attempts.lt(MAX_TOTAL_ATTEMPTS))
            .load::<Self>(&mut conn)
            .await?;

        Ok(rows)
    }

    /// Terminally failed rows awaiting manual download
    pub async fn get_terminal_failures(
        pool: &crate::database::DatabasePool,
    ) -> crate::error::AppResult<Vec<Self>> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let rows = dsl::taxonomy_libraries
            .filter(dsl::is_terminal.eq(true))
            .load::<Self>(&mut conn)
            .await?;

        Ok(rows)
    }

    /// Per-status row counts for statistics reporting
    pub async fn count_by_status(
        pool: &crate::database::DatabasePool,
        status: &str,
    ) -> crate::error::AppResult<i64> {
        use crate::schema::taxonomy_libraries::dsl;

        let mut conn = pool.get().await?;

        let count = dsl::taxonomy_libraries
            .filter(dsl::download_status.eq(status))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok(count)
    }

    /// URLs already tried and abandoned for this library
    pub fn urls_tried(&self) -> Vec<String> {
        self.alternative_urls_tried
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Filing search ids depending on this library
    pub fn required_by_filing_ids(&self) -> Vec<String> {
        self.required_by_filings
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the retry monitor may still act on this row
    pub fn can_retry(&self) -> bool {
        !self.is_terminal && self.total_attempts < MAX_TOTAL_ATTEMPTS
    }
}
