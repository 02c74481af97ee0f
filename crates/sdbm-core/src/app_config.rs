use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub apps_path: PathBuf,
    pub catalog_url: String,
    pub catalog_limit: usize,
    pub http_timeout_secs: u64,
    pub target_base_url: String,
    pub navigation_timeout_secs: u64,
    pub inter_app_delay_secs: u64,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub unlocker_url: String,
    pub unlocker_token: Option<String>,
    pub unlocker_zone: String,
    pub unlocker_timeout_secs: u64,
    pub bq_project: String,
    pub bq_dataset: String,
    pub bq_table: String,
    pub bq_location: Option<String>,
    pub bq_access_token: String,
    pub sql_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("apps_path", &self.apps_path)
            .field("catalog_url", &self.catalog_url)
            .field("catalog_limit", &self.catalog_limit)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("target_base_url", &self.target_base_url)
            .field("navigation_timeout_secs", &self.navigation_timeout_secs)
            .field("inter_app_delay_secs", &self.inter_app_delay_secs)
            .field("browserless_url", &self.browserless_url)
            .field(
                "browserless_token",
                &self.browserless_token.as_ref().map(|_| "[redacted]"),
            )
            .field("unlocker_url", &self.unlocker_url)
            .field(
                "unlocker_token",
                &self.unlocker_token.as_ref().map(|_| "[redacted]"),
            )
            .field("unlocker_zone", &self.unlocker_zone)
            .field("unlocker_timeout_secs", &self.unlocker_timeout_secs)
            .field("bq_project", &self.bq_project)
            .field("bq_dataset", &self.bq_dataset)
            .field("bq_table", &self.bq_table)
            .field("bq_location", &self.bq_location)
            .field("bq_access_token", &"[redacted]")
            .field("sql_dir", &self.sql_dir)
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}
