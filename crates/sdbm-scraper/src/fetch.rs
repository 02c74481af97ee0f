//! Page retrieval with fingerprint randomization and challenge fallback.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{BrowserDriver, BrowserSession, LaunchOptions};
use crate::error::ScraperError;
use crate::fingerprint::{FingerprintPools, RandomSource};
use crate::unlocker::UnlockerClient;

/// Case-insensitive substrings that identify an anti-bot interstitial.
const CHALLENGE_MARKERS: [&str; 6] = [
    "checking your browser",
    "just a moment...",
    "attention required! | cloudflare",
    "/cdn-cgi/challenge-platform/",
    "cf-chl-",
    "verify you are human",
];

/// Returns `true` when `markup` looks like a bot-challenge page rather than
/// the requested content.
#[must_use]
pub fn looks_like_challenge(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Why no usable markup was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("navigation timed out after {0}s")]
    NavigationTimeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("challenge unresolved: {0}")]
    ChallengeUnresolved(String),
}

impl From<&ScraperError> for FetchFailure {
    fn from(err: &ScraperError) -> Self {
        match err {
            ScraperError::NavigationTimeout { timeout_secs, .. } => {
                Self::NavigationTimeout(*timeout_secs)
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result of one page retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No challenge; the browser-rendered markup.
    Success(String),
    /// A challenge was detected and the unlocker returned this markup.
    ChallengeFallbackSucceeded(String),
    /// A challenge was detected, the unlocker failed, and this is whatever
    /// the single reload produced.
    ChallengeFallbackFailed(String),
    Failure(FetchFailure),
}

impl FetchOutcome {
    #[must_use]
    pub fn into_markup(self) -> Option<String> {
        match self {
            Self::Success(m) | Self::ChallengeFallbackSucceeded(m) | Self::ChallengeFallbackFailed(m) => {
                Some(m)
            }
            Self::Failure(_) => None,
        }
    }

    /// Short label for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ChallengeFallbackSucceeded(_) => "challenge_fallback_succeeded",
            Self::ChallengeFallbackFailed(_) => "challenge_fallback_failed",
            Self::Failure(_) => "failure",
        }
    }
}

/// Anything that can turn an app id into a [`FetchOutcome`].
#[async_trait]
pub trait PageFetcher: Send {
    /// Never fails: every error is folded into [`FetchOutcome::Failure`].
    async fn fetch(&mut self, app_id: i64) -> FetchOutcome;
}

/// Timing and target knobs for [`FetchStrategy`].
///
/// Ranges are inclusive and in seconds.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub target_base_url: String,
    pub navigation_timeout: Duration,
    pub pointer_range: (u32, u32),
    pub pre_navigation_idle: (f64, f64),
    pub challenge_backoff: (f64, f64),
    pub post_reload_settle: (f64, f64),
}

impl FetchSettings {
    #[must_use]
    pub fn new(target_base_url: &str, navigation_timeout: Duration) -> Self {
        Self {
            target_base_url: target_base_url.trim_end_matches('/').to_owned(),
            navigation_timeout,
            pointer_range: (50, 200),
            pre_navigation_idle: (0.5, 1.5),
            challenge_backoff: (10.0, 20.0),
            post_reload_settle: (3.0, 7.0),
        }
    }

    /// Same target and timeout with every randomized sleep set to zero.
    #[must_use]
    pub fn without_delays(mut self) -> Self {
        self.pre_navigation_idle = (0.0, 0.0);
        self.challenge_backoff = (0.0, 0.0);
        self.post_reload_settle = (0.0, 0.0);
        self
    }

    /// Charts page URL for `app_id`.
    #[must_use]
    pub fn app_url(&self, app_id: i64) -> String {
        format!("{}/app/{app_id}/charts/", self.target_base_url)
    }
}

/// Browser-first page retrieval with an unlocker fallback.
///
/// Each call launches a fresh session with a newly drawn fingerprint and
/// closes it before returning, whatever the outcome.
pub struct FetchStrategy<D, R> {
    driver: D,
    unlocker: Option<UnlockerClient>,
    rng: R,
    pools: FingerprintPools,
    settings: FetchSettings,
}

impl<D, R> FetchStrategy<D, R>
where
    D: BrowserDriver,
    R: RandomSource,
{
    pub fn new(driver: D, unlocker: Option<UnlockerClient>, rng: R, settings: FetchSettings) -> Self {
        Self {
            driver,
            unlocker,
            rng,
            pools: FingerprintPools::default(),
            settings,
        }
    }

    /// Retrieves the charts page for `app_id`.
    pub async fn fetch_page(&mut self, app_id: i64) -> FetchOutcome {
        let url = self.settings.app_url(app_id);
        let fingerprint = self.pools.draw(&mut self.rng);
        tracing::debug!(
            app_id,
            user_agent = %fingerprint.user_agent,
            locale = %fingerprint.locale,
            timezone = %fingerprint.timezone,
            color_scheme = fingerprint.color_scheme.as_str(),
            "fingerprint drawn"
        );

        let mut session = match self.driver.launch(LaunchOptions::hardened(fingerprint)).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(app_id, error = %e, "failed to launch browser session");
                return FetchOutcome::Failure(FetchFailure::from(&e));
            }
        };

        let outcome = match self.drive(&mut session, &url, app_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(app_id, url = %url, error = %e, "page retrieval failed");
                FetchOutcome::Failure(FetchFailure::from(&e))
            }
        };

        if let Err(e) = session.close().await {
            tracing::warn!(app_id, error = %e, "failed to close browser session");
        }

        tracing::info!(app_id, outcome = outcome.kind(), "page retrieval finished");
        outcome
    }

    async fn drive(
        &mut self,
        session: &mut D::Session,
        url: &str,
        app_id: i64,
    ) -> Result<FetchOutcome, ScraperError> {
        let (low, high) = self.settings.pointer_range;
        let x = self.rng.between(low, high);
        let y = self.rng.between(low, high);
        session.move_pointer(x, y).await?;
        self.pause(self.settings.pre_navigation_idle).await;

        let timeout = self.settings.navigation_timeout;
        let limit = timeout + self.driver.navigation_slack();
        tracing::info!(app_id, url, "navigating");
        bounded(session.goto(url, timeout), url, timeout, limit).await?;
        let markup = session.content().await?;

        if !looks_like_challenge(&markup) {
            return Ok(FetchOutcome::Success(markup));
        }

        tracing::warn!(app_id, url, "bot challenge detected, trying unlocker");
        if let Some(markup) = unlock(self.unlocker.as_ref(), url, app_id).await {
            return Ok(FetchOutcome::ChallengeFallbackSucceeded(markup));
        }

        tracing::warn!(app_id, "unlocker failed, backing off before a single reload");
        self.pause(self.settings.challenge_backoff).await;
        if let Err(e) = bounded(session.reload(timeout), url, timeout, limit).await {
            tracing::warn!(app_id, error = %e, "reload after challenge failed");
            return Ok(FetchOutcome::Failure(FetchFailure::ChallengeUnresolved(
                e.to_string(),
            )));
        }
        self.pause(self.settings.post_reload_settle).await;

        match session.content().await {
            Ok(markup) => Ok(FetchOutcome::ChallengeFallbackFailed(markup)),
            Err(e) => Ok(FetchOutcome::Failure(FetchFailure::ChallengeUnresolved(
                e.to_string(),
            ))),
        }
    }

    async fn pause(&mut self, (low, high): (f64, f64)) {
        let secs = self.rng.uniform(low, high);
        if secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }
}

#[async_trait]
impl<D, R> PageFetcher for FetchStrategy<D, R>
where
    D: BrowserDriver,
    R: RandomSource,
{
    async fn fetch(&mut self, app_id: i64) -> FetchOutcome {
        self.fetch_page(app_id).await
    }
}

/// Asks the unlocker for the page; `None` when it is absent or fails.
async fn unlock(unlocker: Option<&UnlockerClient>, url: &str, app_id: i64) -> Option<String> {
    let Some(unlocker) = unlocker else {
        tracing::warn!(app_id, "no unlocker token configured, skipping fallback");
        return None;
    };
    match unlocker.fetch_markup(url).await {
        Ok(markup) => Some(markup),
        Err(e) => {
            tracing::warn!(app_id, error = %e, "unlocker request failed");
            None
        }
    }
}

/// Runs a navigation step under a wall-clock `limit`. A timeout is reported
/// against the navigation `timeout` the step was given, not the limit.
async fn bounded<F>(
    step: F,
    url: &str,
    timeout: Duration,
    limit: Duration,
) -> Result<(), ScraperError>
where
    F: Future<Output = Result<(), ScraperError>>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => Err(ScraperError::NavigationTimeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;
