use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One app the collector should scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub app_id: i64,
    /// Human label for logs; the page title is scraped independently.
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppsFile {
    pub apps: Vec<AppEntry>,
}

impl AppsFile {
    /// App ids in file order.
    #[must_use]
    pub fn app_ids(&self) -> Vec<i64> {
        self.apps.iter().map(|a| a.app_id).collect()
    }
}

/// Load and validate the scrape target list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_apps(path: &Path) -> Result<AppsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AppsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_apps(&content)
}

fn parse_apps(content: &str) -> Result<AppsFile, ConfigError> {
    let apps_file: AppsFile = serde_yaml::from_str(content)?;
    validate_apps(&apps_file)?;
    Ok(apps_file)
}

fn validate_apps(apps_file: &AppsFile) -> Result<(), ConfigError> {
    if apps_file.apps.is_empty() {
        return Err(ConfigError::Validation(
            "apps list must contain at least one entry".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for app in &apps_file.apps {
        if app.app_id <= 0 {
            return Err(ConfigError::Validation(format!(
                "app_id must be positive, got {}",
                app.app_id
            )));
        }
        if !seen.insert(app.app_id) {
            return Err(ConfigError::Validation(format!(
                "duplicate app_id: {}",
                app.app_id
            )));
        }
    }

    Ok(())
}
