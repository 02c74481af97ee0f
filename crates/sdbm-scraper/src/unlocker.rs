//! Client for a managed unlocking service (Bright Data Web Unlocker API).
//!
//! The service fetches a URL through its own proxy and challenge-solving
//! stack and returns the raw page body.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::error::ScraperError;

#[derive(Debug, Serialize)]
struct UnlockRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'static str,
}

pub struct UnlockerClient {
    client: Client,
    endpoint: String,
    token: String,
    zone: String,
}

impl UnlockerClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        token: &str,
        zone: &str,
        timeout_secs: u64,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
            token: token.to_owned(),
            zone: zone.to_owned(),
        })
    }

    /// Fetches `url` through the unlocker and returns the page markup.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Http`] on transport failure or timeout.
    /// - [`ScraperError::UnexpectedStatus`] for anything other than `200 OK`.
    pub async fn fetch_markup(&self, url: &str) -> Result<String, ScraperError> {
        tracing::info!(url, zone = %self.zone, "fetching page through unlocker");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&UnlockRequest {
                zone: &self.zone,
                url,
                format: "raw",
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
                body,
            });
        }

        let markup = response.text().await?;
        tracing::info!(url, bytes = markup.len(), "unlocker returned page");
        Ok(markup)
    }
}
