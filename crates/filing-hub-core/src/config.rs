use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database: DatabasePoolConfig,
    pub paths: PathsConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub acquisition: AcquisitionConfig,
    pub safety: SafetyConfig,
    pub credentials: CredentialsConfig,
    pub library: LibrarySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabasePoolConfig {
    pub pool_size: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

/// Directory roots for all on-disk artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_root: PathBuf,
    pub entities_dir: PathBuf,
    pub taxonomies_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub manual_downloads_dir: PathBuf,
    pub manual_processed_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub max_retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    pub max_concurrent: usize,
    pub chunk_size: usize,
    pub enable_resume: bool,
}

/// Limits guarding archive extraction and downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub max_archive_size: u64,
    pub max_extraction_depth: usize,
    pub min_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub sec_user_agent: String,
    pub uk_ch_api_key: Option<String>,
    pub uk_ch_user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySettings {
    pub monitor_interval_seconds: u64,
    pub min_files_threshold: i32,
    pub cache_ttl_seconds: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let data_root = env_path("DATA_ROOT", PathBuf::from("./data"));

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost:5432/filing_hub".to_string()),

            database: DatabasePoolConfig {
                pool_size: env_or("DB_POOL_SIZE", 20),
                connection_timeout_seconds: env_or("DB_POOL_CONNECTION_TIMEOUT", 30),
                idle_timeout_seconds: env_or("DB_POOL_IDLE_TIMEOUT", 300),
            },

            paths: PathsConfig {
                entities_dir: env_path("DATA_ENTITIES", data_root.join("entities")),
                taxonomies_dir: env_path("LIBRARY_TAXONOMIES", data_root.join("taxonomies")),
                temp_dir: env_path("DATA_TEMP", data_root.join("temp")),
                cache_dir: env_path("DATA_CACHE", data_root.join("cache")),
                log_dir: env_path("DATA_LOG", data_root.join("logs")),
                manual_downloads_dir: env_path(
                    "LIBRARY_MANUAL_DOWNLOADS",
                    data_root.join("manual_downloads"),
                ),
                manual_processed_dir: env_path(
                    "LIBRARY_MANUAL_PROCESSED",
                    data_root.join("manual_processed"),
                ),
                data_root,
            },

            http: HttpConfig {
                request_timeout_seconds: env_or("REQUEST_TIMEOUT", 60),
                connect_timeout_seconds: env_or("CONNECT_TIMEOUT", 10),
                read_timeout_seconds: env_or("READ_TIMEOUT", 300),
            },

            retry: RetryConfig {
                retry_attempts: env_or("RETRY_ATTEMPTS", 3),
                retry_delay_seconds: env_or("RETRY_DELAY", 1),
                max_retry_delay_seconds: env_or("MAX_RETRY_DELAY", 60),
            },

            acquisition: AcquisitionConfig {
                max_concurrent: env_or("MAX_CONCURRENT", 4),
                chunk_size: env_or("CHUNK_SIZE", 8192),
                enable_resume: env_or("ENABLE_RESUME", true),
            },

            safety: SafetyConfig {
                max_archive_size: env_or("MAX_ARCHIVE_SIZE", 1_073_741_824),
                max_extraction_depth: env_or("MAX_EXTRACTION_DEPTH", 10),
                min_file_size: env_or("MIN_FILE_SIZE", 100),
            },

            credentials: CredentialsConfig {
                sec_user_agent: env::var("SEC_USER_AGENT")
                    .unwrap_or_else(|_| "FilingHub admin@filinghub.example".to_string()),
                uk_ch_api_key: env::var("UK_CH_API_KEY").ok(),
                uk_ch_user_agent: env::var("UK_CH_USER_AGENT")
                    .unwrap_or_else(|_| "FilingHub/0.1".to_string()),
            },

            library: LibrarySettings {
                monitor_interval_seconds: env_or("LIBRARY_MONITOR_INTERVAL", 60),
                min_files_threshold: env_or("LIBRARY_MIN_FILES_THRESHOLD", 5),
                cache_ttl_seconds: env_or("LIBRARY_CACHE_TTL", 3600),
            },
        })
    }
}

impl PathsConfig {
    /// Create every configured directory, returning how many were checked.
    pub fn ensure_all_directories(&self) -> AppResult<usize> {
        let dirs = [
            &self.data_root,
            &self.entities_dir,
            &self.taxonomies_dir,
            &self.temp_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.manual_downloads_dir,
            &self.manual_processed_dir,
        ];

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::ConfigError(format!("Cannot create directory {}: {}", dir.display(), e))
            })?;
        }

        Ok(dirs.len())
    }
}
