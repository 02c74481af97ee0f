//! Shared types and configuration for the SteamDB metrics collector.

pub mod app_config;
pub mod apps;
pub mod config;
pub mod record;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use apps::{load_apps, AppEntry, AppsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use record::{AppMetrics, RecordPayload, ScrapedRecord, TITLE_NOT_FOUND};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read apps file {path}: {source}")]
    AppsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse apps file: {0}")]
    AppsFileParse(#[from] serde_yaml::Error),

    #[error("apps file validation failed: {0}")]
    Validation(String),
}
