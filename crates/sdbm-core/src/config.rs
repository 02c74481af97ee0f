use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_CATALOG_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
const DEFAULT_UNLOCKER_URL: &str = "https://api.brightdata.com/request";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let bq_project = require("SDBM_BQ_PROJECT")?;
    let bq_access_token = require("SDBM_BQ_ACCESS_TOKEN")?;

    let env = parse_environment(&or_default("SDBM_ENV", "development")).map_err(|reason| {
        ConfigError::InvalidEnvVar {
            var: "SDBM_ENV".to_string(),
            reason,
        }
    })?;

    let log_level = or_default("SDBM_LOG_LEVEL", "info");
    let apps_path = PathBuf::from(or_default("SDBM_APPS_PATH", "./config/apps.yaml"));
    let catalog_url = or_default("SDBM_CATALOG_URL", DEFAULT_CATALOG_URL);
    let catalog_limit = parse_usize("SDBM_CATALOG_LIMIT", "1000")?;
    let http_timeout_secs = parse_u64("SDBM_HTTP_TIMEOUT_SECS", "30")?;

    let target_base_url = or_default("SDBM_TARGET_BASE_URL", "https://steamdb.info");
    let navigation_timeout_secs = parse_u64("SDBM_NAVIGATION_TIMEOUT_SECS", "30")?;
    if navigation_timeout_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SDBM_NAVIGATION_TIMEOUT_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let inter_app_delay_secs = parse_u64("SDBM_INTER_APP_DELAY_SECS", "10")?;

    let browserless_url = or_default("SDBM_BROWSERLESS_URL", "http://localhost:3000");
    let browserless_token = optional("SDBM_BROWSERLESS_TOKEN");

    let unlocker_url = or_default("SDBM_UNLOCKER_URL", DEFAULT_UNLOCKER_URL);
    let unlocker_token = optional("SDBM_UNLOCKER_TOKEN");
    let unlocker_zone = or_default("SDBM_UNLOCKER_ZONE", "web_unlocker1");
    let unlocker_timeout_secs = parse_u64("SDBM_UNLOCKER_TIMEOUT_SECS", "60")?;

    let bq_dataset = or_default("SDBM_BQ_DATASET", "steam_data");
    let bq_table = or_default("SDBM_BQ_TABLE", "steam_app_metrics");
    let bq_location = optional("SDBM_BQ_LOCATION");

    let sql_dir = PathBuf::from(or_default("SDBM_SQL_DIR", "./sql"));
    let staging_dir = optional("SDBM_STAGING_DIR").map_or_else(std::env::temp_dir, PathBuf::from);

    Ok(AppConfig {
        env,
        log_level,
        apps_path,
        catalog_url,
        catalog_limit,
        http_timeout_secs,
        target_base_url,
        navigation_timeout_secs,
        inter_app_delay_secs,
        browserless_url,
        browserless_token,
        unlocker_url,
        unlocker_token,
        unlocker_zone,
        unlocker_timeout_secs,
        bq_project,
        bq_dataset,
        bq_table,
        bq_location,
        bq_access_token,
        sql_dir,
        staging_dir,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, String> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(format!(
            "unknown environment '{other}'; expected development, test, or production"
        )),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
