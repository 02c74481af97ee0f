//! Steam app catalog listing (`ISteamApps/GetAppList/v2`).

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::ScraperError;

pub struct CatalogClient {
    client: Client,
    url: String,
}

impl CatalogClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    /// Lists catalog app ids in source order, truncated to `limit`.
    ///
    /// Only entries whose `appid` is a JSON integer and whose `name` is not
    /// blank are kept. `None` or `Some(0)` means no limit.
    ///
    /// An empty result means the catalog could not be read (the failure is
    /// logged), not that the catalog is empty.
    pub async fn list_app_ids(&self, limit: Option<usize>) -> Vec<i64> {
        match self.fetch_app_ids(limit).await {
            Ok(ids) => {
                tracing::info!(count = ids.len(), "catalog app ids loaded");
                ids
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "failed to load app catalog");
                Vec::new()
            }
        }
    }

    async fn fetch_app_ids(&self, limit: Option<usize>) -> Result<Vec<i64>, ScraperError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
                body,
            });
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).map_err(|e| ScraperError::Deserialize {
            context: "GetAppList".to_owned(),
            source: e,
        })?;

        let mut ids = valid_app_ids(&body)?;
        if let Some(limit) = limit.filter(|&l| l > 0) {
            ids.truncate(limit);
        }
        Ok(ids)
    }
}

fn valid_app_ids(body: &Value) -> Result<Vec<i64>, ScraperError> {
    let apps = body
        .get("applist")
        .and_then(|list| list.get("apps"))
        .and_then(Value::as_array)
        .ok_or_else(|| ScraperError::UnexpectedShape {
            context: "GetAppList".to_owned(),
            detail: "missing applist.apps array".to_owned(),
        })?;

    Ok(apps
        .iter()
        .filter(|app| {
            app.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| !name.trim().is_empty())
        })
        .filter_map(|app| app.get("appid").and_then(Value::as_i64))
        .collect())
}
