use serde::{Deserialize, Serialize};

/// Download lifecycle status shared by filing searches and taxonomy libraries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Extracting,
    Completed,
    Failed,
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::Pending => write!(f, "pending"),
            DownloadStatus::Downloading => write!(f, "downloading"),
            DownloadStatus::Extracting => write!(f, "extracting"),
            DownloadStatus::Completed => write!(f, "completed"),
            DownloadStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<String> for DownloadStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => DownloadStatus::Pending,
            "downloading" => DownloadStatus::Downloading,
            "extracting" => DownloadStatus::Extracting,
            "completed" => DownloadStatus::Completed,
            "failed" => DownloadStatus::Failed,
            _ => DownloadStatus::Pending,
        }
    }
}

impl DownloadStatus {
    /// Statuses a coordinator may claim for processing
    pub fn is_downloadable(&self) -> bool {
        matches!(self, DownloadStatus::Pending | DownloadStatus::Failed)
    }

    /// Terminal success state
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion() {
        // REQUIREMENT: Status strings from the database map onto the enum
        // PURPOSE: Verify round-trip and the safe default for unknown values
        assert_eq!(
            DownloadStatus::from("pending".to_string()),
            DownloadStatus::Pending
        );
        assert_eq!(
            DownloadStatus::from("COMPLETED".to_string()),
            DownloadStatus::Completed
        );
        assert_eq!(
            DownloadStatus::from("bogus".to_string()),
            DownloadStatus::Pending
        );
        assert_eq!(DownloadStatus::Extracting.to_string(), "extracting");
    }

    #[test]
    fn test_downloadable_statuses() {
        // REQUIREMENT: Both pending and failed rows appear in the download queue
        // PURPOSE: Verify the claimable set used by the coordinator query
        assert!(DownloadStatus::Pending.is_downloadable());
        assert!(DownloadStatus::Failed.is_downloadable());
        assert!(!DownloadStatus::Downloading.is_downloadable());
        assert!(!DownloadStatus::Completed.is_downloadable());
    }
}
