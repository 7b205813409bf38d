use thiserror::Error;

/// Application-specific error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation errors: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convert from bb8 pool error
impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for AppError {
    fn from(err: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        AppError::ConnectionPool(err.to_string())
    }
}

/// Convert from diesel migration error
impl From<diesel_migrations::MigrationError> for AppError {
    fn from(err: diesel_migrations::MigrationError) -> Self {
        AppError::MigrationError(err.to_string())
    }
}

/// Convert from chrono parse error
impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::InvalidDateFormat(err.to_string())
    }
}

/// Convert from uuid parse error
impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::ValidationError(format!("Invalid UUID: {}", err))
    }
}

/// Convert from url parse error
impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::InvalidUrl(err.to_string())
    }
}

/// Utility functions for common error scenarios
impl AppError {
    pub fn not_found<T: std::fmt::Display>(resource: T) -> Self {
        AppError::NotFound(format!("{} not found", resource))
    }

    pub fn internal_error<T: std::fmt::Display>(message: T) -> Self {
        AppError::InternalError(message.to_string())
    }

    pub fn validation_error<T: std::fmt::Display>(message: T) -> Self {
        AppError::ValidationError(message.to_string())
    }

    pub fn download_error<T: std::fmt::Display>(message: T) -> Self {
        AppError::DownloadError(message.to_string())
    }

    /// Log the error with appropriate level and context
    pub fn log_with_context(&self, context: &str) {
        match self {
            // Critical errors that need immediate attention
            AppError::Database(_)
            | AppError::ConnectionPool(_)
            | AppError::MigrationError(_)
            | AppError::InternalError(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            // External service errors
            AppError::HttpClient(_)
            | AppError::ExternalApiError(_)
            | AppError::DownloadError(_)
            | AppError::ExtractionError(_) => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
            // Client errors (warnings)
            AppError::ValidationError(_)
            | AppError::ValidationErrors(_)
            | AppError::InvalidDateFormat(_)
            | AppError::InvalidUrl(_)
            | AppError::SearchError(_)
            | AppError::RateLimitExceeded => {
                tracing::warn!("{} - {}: {}", context, self.error_type(), self);
            }
            // Not found errors (info level)
            AppError::NotFound(_) => {
                tracing::info!("{} - {}: {}", context, self.error_type(), self);
            }
            // Other errors
            _ => {
                tracing::error!("{} - {}: {}", context, self.error_type(), self);
            }
        }
    }

    /// Get a human-readable error type for logging
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DatabaseError",
            AppError::ConnectionPool(_) => "ConnectionPoolError",
            AppError::HttpClient(_) => "HttpClientError",
            AppError::JsonSerialization(_) => "JsonSerializationError",
            AppError::ValidationError(_) => "ValidationError",
            AppError::ValidationErrors(_) => "ValidationErrors",
            AppError::ConfigError(_) => "ConfigError",
            AppError::Io(_) => "IoError",
            AppError::InvalidDateFormat(_) => "InvalidDateFormat",
            AppError::InvalidUrl(_) => "InvalidUrl",
            AppError::RateLimitExceeded => "RateLimitExceeded",
            AppError::ExternalApiError(_) => "ExternalApiError",
            AppError::DownloadError(_) => "DownloadError",
            AppError::ExtractionError(_) => "ExtractionError",
            AppError::SearchError(_) => "SearchError",
            AppError::MigrationError(_) => "MigrationError",
            AppError::NotFound(_) => "NotFound",
            AppError::InternalError(_) => "InternalError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        // REQUIREMENT: Errors carry their stage and message for failure rows
        // PURPOSE: Verify the rendered messages are stable for persistence
        let err = AppError::DownloadError("HTTP 404".to_string());
        assert_eq!(err.to_string(), "Download error: HTTP 404");

        let err = AppError::not_found("Taxonomy us-gaap/2024");
        assert_eq!(err.to_string(), "Not found: Taxonomy us-gaap/2024 not found");
    }

    #[test]
    fn test_error_conversions() {
        // REQUIREMENT: Lower-level errors must convert into AppError with `?`
        // PURPOSE: Verify the From impls used throughout the pipeline
        let parse_err: AppError = "not-a-date"
            .parse::<chrono::NaiveDate>()
            .unwrap_err()
            .into();
        assert!(matches!(parse_err, AppError::InvalidDateFormat(_)));

        let url_err: AppError = url::Url::parse("::nope::").unwrap_err().into();
        assert!(matches!(url_err, AppError::InvalidUrl(_)));
    }
}
