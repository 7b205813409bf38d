use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::schema::{entities, filing_searches};

/// A filing discovered by a market searcher, queued for download.
///
/// Exactly one row exists per `(entity_id, accession_number)` pair. Rows are
/// created `pending` by the search orchestrator and transitioned by the
/// download coordinator.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = filing_searches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FilingSearch {
    pub search_id: Uuid,
    pub entity_id: Uuid,
    pub market_type: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub filing_url: String,
    pub accession_number: String,
    pub search_metadata: serde_json::Value,
    pub download_status: String,
    pub extraction_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New filing search row for insertion
#[derive(Debug, Clone, Insertable, Validate, Deserialize)]
#[diesel(table_name = filing_searches)]
pub struct NewFilingSearch {
    pub entity_id: Uuid,
    #[validate(length(min = 1, max = 20))]
    pub market_type: String,
    #[validate(length(min = 1, max = 50))]
    pub form_type: String,
    pub filing_date: NaiveDate,
    #[validate(url)]
    pub filing_url: String,
    #[validate(length(min = 1, max = 100))]
    pub accession_number: String,
    pub search_metadata: serde_json::Value,
    pub download_status: String,
    pub extraction_status: String,
}

/// Flat download-queue record with the company name already joined in.
///
/// The repository performs its own eager read against `entities` so callers
/// never need a live session to render the queue.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
pub struct DownloadableFiling {
    pub search_id: Uuid,
    pub entity_id: Uuid,
    pub market_type: String,
    pub form_type: String,
    pub filing_date: NaiveDate,
    pub filing_url: String,
    pub accession_number: String,
    pub download_status: String,
    pub company_name: String,
}

impl FilingSearch {
    /// Insert a new filing search row.
    ///
    /// Returns `None` when a row for `(entity_id, accession_number)` already
    /// exists, which keeps repeat searches idempotent.
    pub async fn create(
        pool: &crate::database::DatabasePool,
        new_filing: &NewFilingSearch,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::filing_searches::dsl;

        new_filing.validate()?;

        let mut conn = pool.get().await?;

        let filing = diesel::insert_into(dsl::filing_searches)
            .values(new_filing)
            .on_conflict((dsl::entity_id, dsl::accession_number))
            .do_nothing()
            .get_result::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(filing)
    }

    /// Fetch a filing search by id
    pub async fn find_by_id(
        pool: &crate::database::DatabasePool,
        search_id: Uuid,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::filing_searches::dsl;

        let mut conn = pool.get().await?;

        let filing = dsl::filing_searches
            .filter(dsl::search_id.eq(search_id))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(filing)
    }

    /// Downloadable rows (`pending` or `failed`), failed first, newest filings
    /// first within each status, with the company name joined in.
    pub async fn get_downloadable(
        pool: &crate::database::DatabasePool,
        limit: i64,
    ) -> crate::error::AppResult<Vec<DownloadableFiling>> {
        use crate::schema::filing_searches::dsl;

        let mut conn = pool.get().await?;

        let rows = dsl::filing_searches
            .inner_join(entities::table)
            .filter(dsl::download_status.eq_any(vec!["pending", "failed"]))
            .order((dsl::download_status.asc(), dsl::filing_date.desc()))
            .limit(limit)
            .select((
                dsl::search_id,
                dsl::entity_id,
                dsl::market_type,
                dsl::form_type,
                dsl::filing_date,
                dsl::filing_url,
                dsl::accession_number,
                dsl::download_status,
                entities::company_name,
            ))
            .load::<DownloadableFiling>(&mut conn)
            .await?;

        Ok(rows)
    }

    /// Atomically claim a row for download.
    ///
    /// The conditional UPDATE is the ownership mechanism: only one coordinator
    /// wins the `pending`/`failed` -> `downloading` transition.
    pub async fn claim_for_download(
        pool: &crate::database::DatabasePool,
        search_id: Uuid,
    ) -> crate::error::AppResult<bool> {
        use crate::schema::filing_searches::dsl;

        let mut conn = pool.get().await?;

        let updated = diesel::update(
            dsl::filing_searches
                .filter(dsl::search_id.eq(search_id))
                .filter(dsl::download_status.eq_any(vec!["pending", "failed"])),
        )
        .set((
            dsl::download_status.eq("downloading"),
            dsl::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated == 1)
    }

    /// Mark a filing search completed
    pub async fn mark_completed(
        pool: &crate::database::DatabasePool,
        search_id: Uuid,
    ) -> crate::error::AppResult<()> {
        use crate::schema::filing_searches::dsl;

        let mut conn = pool.get().await?;

        diesel::update(dsl::filing_searches.filter(dsl::search_id.eq(search_id)))
            .set((
                dsl::download_status.eq("completed"),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Mark a filing search failed, recording the message in the metadata
    /// sidecar under `error_message`.
    pub async fn mark_failed(
        pool: &crate::database::DatabasePool,
        search_id: Uuid,
        error_message: &str,
    ) -> crate::error::AppResult<()> {
        use crate::schema::filing_searches::dsl;

        let mut conn = pool.get().await?;

        let filing = dsl::filing_searches
            .filter(dsl::search_id.eq(search_id))
            .first::<Self>(&mut conn)
            .await?;

        let mut metadata = filing.search_metadata;
        if let Some(map) = metadata.as_object_mut() {
            map.insert(
                "error_message".to_string(),
                serde_json::Value::String(error_message.to_string()),
            );
        } else {
            metadata = serde_json::json!({ "error_message": error_message });
        }

        diesel::update(dsl::filing_searches.filter(dsl::search_id.eq(search_id)))
            .set((
                dsl::download_status.eq("failed"),
                dsl::search_metadata.eq(metadata),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
