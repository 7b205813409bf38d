use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::coordinator::FilingLibraryReport;

/// TTL cache for per-filing library resolution results.
///
/// Re-scanning a filing whose requirements were just computed is pure waste;
/// entries expire after the configured TTL so deleted directories are
/// eventually re-noticed.
pub struct ResultCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, FilingLibraryReport)>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, filing_id: &str) -> Option<&FilingLibraryReport> {
        let (cached_at, report) = self.entries.get(filing_id)?;

        if cached_at.elapsed() > self.ttl {
            debug!("Cache entry expired for {}", filing_id);
            return None;
        }

        debug!("Cache hit for {}", filing_id);
        Some(report)
    }

    pub fn put(&mut self, filing_id: &str, report: FilingLibraryReport) {
        self.entries
            .insert(filing_id.to_string(), (Instant::now(), report));
    }

    pub fn invalidate(&mut self, filing_id: &str) {
        self.entries.remove(filing_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, (cached_at, _)| cached_at.elapsed() <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
