//! [`BrowserDriver`] backed by a Browserless `/content` endpoint.
//!
//! Browserless renders a page in a fresh headless Chrome per request and
//! returns the serialized DOM, so a "session" here is a small state holder:
//! `goto` and `reload` each issue one render request with the session's
//! fingerprint, and `content` returns the last rendered markup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};

use super::{BrowserDriver, BrowserSession, LaunchOptions};
use crate::error::ScraperError;
use crate::fingerprint::ColorScheme;

/// Extra wall-clock allowance on top of the navigation timeout for the
/// render request itself (queueing, browser start-up, serialization).
const REQUEST_SLACK: Duration = Duration::from_secs(15);

pub struct BrowserlessDriver {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl BrowserlessDriver {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built, or
    /// [`ScraperError::InvalidUrl`] if `base_url` does not parse.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| ScraperError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()).map(str::to_owned),
        })
    }

    fn content_endpoint(&self, options: &LaunchOptions) -> Result<Url, ScraperError> {
        let mut endpoint = self
            .base_url
            .join("content")
            .map_err(|e| ScraperError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;

        let launch = launch_params(options);
        {
            let mut query = endpoint.query_pairs_mut();
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
            if options.stealth {
                query.append_pair("stealth", "true");
            }
            query.append_pair("launch", &launch.to_string());
        }
        Ok(endpoint)
    }
}

#[async_trait]
impl BrowserDriver for BrowserlessDriver {
    type Session = BrowserlessSession;

    fn navigation_slack(&self) -> Duration {
        REQUEST_SLACK
    }

    async fn launch(&self, options: LaunchOptions) -> Result<Self::Session, ScraperError> {
        let endpoint = self.content_endpoint(&options)?;
        tracing::debug!(
            user_agent = %options.fingerprint.user_agent,
            locale = %options.fingerprint.locale,
            timezone = %options.fingerprint.timezone,
            "browser session launched"
        );
        Ok(BrowserlessSession {
            client: self.client.clone(),
            endpoint,
            options,
            current_url: None,
            markup: None,
            pointer: None,
            closed: false,
        })
    }
}

/// Fingerprint and last render of one logical session. Each `goto` or
/// `reload` is a separate render in a fresh browser, so the pointer position
/// is tracked for traces only.
pub struct BrowserlessSession {
    client: Client,
    endpoint: Url,
    options: LaunchOptions,
    current_url: Option<String>,
    markup: Option<String>,
    pointer: Option<(u32, u32)>,
    closed: bool,
}

impl BrowserlessSession {
    fn ensure_open(&self) -> Result<(), ScraperError> {
        if self.closed {
            return Err(ScraperError::Browser("session already closed".to_owned()));
        }
        Ok(())
    }

    async fn render(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.ensure_open()?;
        let body = render_body(&self.options, url, timeout);

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(timeout + REQUEST_SLACK)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScraperError::NavigationTimeout {
                        url: url.to_owned(),
                        timeout_secs: timeout.as_secs(),
                    }
                } else {
                    ScraperError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Browserless reports navigation timeouts as 408.
            if status.as_u16() == 408 {
                return Err(ScraperError::NavigationTimeout {
                    url: url.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
                body,
            });
        }

        self.markup = Some(response.text().await?);
        self.current_url = Some(url.to_owned());
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for BrowserlessSession {
    async fn move_pointer(&mut self, x: u32, y: u32) -> Result<(), ScraperError> {
        self.ensure_open()?;
        // The render endpoint has no input channel; the position is only
        // tracked so the idle phase still shows up in traces.
        tracing::trace!(x, y, "pointer moved");
        self.pointer = Some((x, y));
        Ok(())
    }

    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.render(url, timeout).await
    }

    async fn reload(&mut self, timeout: Duration) -> Result<(), ScraperError> {
        let url = self
            .current_url
            .clone()
            .ok_or_else(|| ScraperError::Browser("reload before any navigation".to_owned()))?;
        self.render(&url, timeout).await
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.ensure_open()?;
        self.markup
            .clone()
            .ok_or_else(|| ScraperError::Browser("no page loaded".to_owned()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.closed = true;
        self.markup = None;
        Ok(())
    }
}

/// Browser process options, sent as the `launch` query parameter.
fn launch_params(options: &LaunchOptions) -> Value {
    let fingerprint = &options.fingerprint;
    let mut args = options.args.clone();
    args.push(format!("--lang={}", fingerprint.locale));
    if fingerprint.color_scheme == ColorScheme::Dark {
        args.push("--force-dark-mode".to_owned());
    }
    json!({
        "headless": options.headless,
        "stealth": options.stealth,
        "args": args,
        "env": { "TZ": fingerprint.timezone },
    })
}

fn render_body(options: &LaunchOptions, url: &str, timeout: Duration) -> Value {
    let fingerprint = &options.fingerprint;
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    json!({
        "url": url,
        "userAgent": fingerprint.user_agent,
        "setExtraHTTPHeaders": fingerprint.headers,
        "viewport": {
            "width": fingerprint.viewport.width,
            "height": fingerprint.viewport.height,
            "deviceScaleFactor": fingerprint.device_scale_factor,
        },
        "emulateMediaType": "screen",
        "gotoOptions": {
            "waitUntil": "domcontentloaded",
            "timeout": timeout_ms,
        },
        "waitForSelector": {
            "selector": "body",
            "timeout": timeout_ms,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{FingerprintPools, StdRandom};

    fn options() -> LaunchOptions {
        LaunchOptions::hardened(FingerprintPools::default().draw(&mut StdRandom::seeded(5)))
    }

    #[test]
    fn endpoint_carries_token_stealth_and_launch() {
        let driver = BrowserlessDriver::new("http://localhost:3000/", Some("secret")).unwrap();
        let endpoint = driver.content_endpoint(&options()).unwrap();
        assert_eq!(endpoint.path(), "/content");

        let pairs: Vec<(String, String)> = endpoint
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("token".to_owned(), "secret".to_owned())));
        assert!(pairs.contains(&("stealth".to_owned(), "true".to_owned())));

        let launch = pairs.iter().find(|(k, _)| k == "launch").unwrap();
        let launch: Value = serde_json::from_str(&launch.1).unwrap();
        assert!(launch["args"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a.as_str().is_some_and(|s| s.starts_with("--lang="))));
        assert!(launch["env"]["TZ"].is_string());
    }

    #[test]
    fn blank_token_is_omitted() {
        let driver = BrowserlessDriver::new("http://localhost:3000", Some("  ")).unwrap();
        let endpoint = driver.content_endpoint(&options()).unwrap();
        assert!(!endpoint.query_pairs().any(|(k, _)| k == "token"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            BrowserlessDriver::new("not a url", None),
            Err(ScraperError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn render_body_uses_fingerprint() {
        let options = options();
        let body = render_body(&options, "https://example.test/app/1/charts/", Duration::from_secs(30));
        assert_eq!(body["userAgent"], options.fingerprint.user_agent.as_str());
        assert_eq!(body["gotoOptions"]["timeout"], 30_000);
        assert_eq!(body["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(body["viewport"]["width"], 1920);
        assert_eq!(
            body["setExtraHTTPHeaders"]["Accept-Language"],
            options.fingerprint.headers["Accept-Language"].as_str()
        );
    }
}
