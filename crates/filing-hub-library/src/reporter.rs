use filing_hub_core::database::DatabasePool;
use filing_hub_core::error::AppResult;
use filing_hub_core::models::TaxonomyLibrary;

/// Library statistics backing the `--stats` command
#[derive(Debug, Clone, Default)]
pub struct LibraryStatistics {
    pub total_libraries: i64,
    pub completed: i64,
    pub pending: i64,
    pub downloading: i64,
    pub failed_will_retry: i64,
    pub failed_permanent: i64,
}

impl LibraryStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.total_libraries == 0 {
            return 0.0;
        }
        (self.completed as f64 / self.total_libraries as f64) * 100.0
    }
}

/// Reads aggregate library state for reporting.
pub struct StatisticsReporter {
    pool: DatabasePool,
}

impl StatisticsReporter {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn gather(&self) -> AppResult<LibraryStatistics> {
        let completed = TaxonomyLibrary::count_by_status(&self.pool, "completed").await?;
        let pending = TaxonomyLibrary::count_by_status(&self.pool, "pending").await?;
        let downloading = TaxonomyLibrary::count_by_status(&self.pool, "downloading").await?;
        let failed = TaxonomyLibrary::count_by_status(&self.pool, "failed").await?;

        let terminal = TaxonomyLibrary::get_terminal_failures(&self.pool).await?.len() as i64;
        let retryable = TaxonomyLibrary::get_retry_candidates(&self.pool).await?.len() as i64;

        Ok(LibraryStatistics {
            total_libraries: completed + pending + downloading + failed,
            completed,
            pending,
            downloading,
            failed_will_retry: retryable,
            failed_permanent: terminal,
        })
    }

    pub fn render(stats: &LibraryStatistics) -> String {
        format!(
            "{border}\nTAXONOMY LIBRARY STATISTICS\n{border}\n\
             Total libraries:    {total}\n\
             Completed:          {completed}\n\
             Pending download:   {pending}\n\
             Downloading:        {downloading}\n\
             Failed (will retry): {retry}\n\
             Failed (permanent): {permanent}\n\
             Success rate:       {rate:.1}%\n{border}",
            border = "=".repeat(60),
            total = stats.total_libraries,
            completed = stats.completed,
            pending = stats.pending,
            downloading = stats.downloading,
            retry = stats.failed_will_retry,
            permanent = stats.failed_permanent,
            rate = stats.success_rate(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        // REQUIREMENT: Statistics summarize library acquisition health
        // PURPOSE: Verify the rate math and the zero-division guard
        let stats = LibraryStatistics {
            total_libraries: 10,
            completed: 7,
            ..Default::default()
        };
        assert!((stats.success_rate() - 70.0).abs() < 0.01);

        let empty = LibraryStatistics::default();
        assert_eq!(empty.success_rate(), 0.0);
    }

    #[test]
    fn test_render_contains_counts() {
        // REQUIREMENT: --stats prints a readable summary
        // PURPOSE: Verify the rendered text carries the figures
        let stats = LibraryStatistics {
            total_libraries: 4,
            completed: 2,
            pending: 1,
            downloading: 0,
            failed_will_retry: 1,
            failed_permanent: 0,
        };

        let text = StatisticsReporter::render(&stats);
        assert!(text.contains("Total libraries:    4"));
        assert!(text.contains("Success rate:       50.0%"));
    }
}
