use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::downloaded_filings;

/// A filing that physically exists on disk.
///
/// Rows are created only after the download directory has been verified
/// non-empty. A reader that finds `download_directory` gone must treat the
/// row as invalid for use.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = downloaded_filings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DownloadedFiling {
    pub filing_id: Uuid,
    pub search_id: Uuid,
    pub entity_id: Uuid,
    pub download_directory: String,
    pub instance_file_path: Option<String>,
    pub download_completed_at: DateTime<Utc>,
}

/// New downloaded filing row for insertion
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = downloaded_filings)]
pub struct NewDownloadedFiling {
    pub search_id: Uuid,
    pub entity_id: Uuid,
    pub download_directory: String,
    pub instance_file_path: Option<String>,
}

impl DownloadedFiling {
    /// Record a verified on-disk filing
    pub async fn create(
        pool: &crate::database::DatabasePool,
        new_filing: &NewDownloadedFiling,
    ) -> crate::error::AppResult<Self> {
        use crate::schema::downloaded_filings::dsl;

        let mut conn = pool.get().await?;

        let filing = diesel::insert_into(dsl::downloaded_filings)
            .values(new_filing)
            .get_result::<Self>(&mut conn)
            .await?;

        Ok(filing)
    }

    /// Fetch the downloaded filing for a search row, if any
    pub async fn find_by_search_id(
        pool: &crate::database::DatabasePool,
        search_id: Uuid,
    ) -> crate::error::AppResult<Option<Self>> {
        use crate::schema::downloaded_filings::dsl;

        let mut conn = pool.get().await?;

        let filing = dsl::downloaded_filings
            .filter(dsl::search_id.eq(search_id))
            .first::<Self>(&mut conn)
            .await
            .optional()?;

        Ok(filing)
    }

    /// Whether the recorded directory still exists and holds at least one file
    pub fn is_valid_on_disk(&self) -> bool {
        let dir = std::path::Path::new(&self.download_directory);
        if !dir.is_dir() {
            return false;
        }

        walk_has_file(dir)
    }
}

fn walk_has_file(dir: &std::path::Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            return true;
        }
        if path.is_dir() && walk_has_file(&path) {
            return true;
        }
    }

    false
}
