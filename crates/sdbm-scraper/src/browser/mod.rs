//! Browser automation seam.
//!
//! [`FetchStrategy`](crate::fetch::FetchStrategy) only talks to these
//! traits, so the concrete engine can be swapped (or faked in tests).
//! [`BrowserlessDriver`] is the production implementation.

mod browserless;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::fingerprint::Fingerprint;

pub use browserless::{BrowserlessDriver, BrowserlessSession};

const HARDENED_ARGS: [&str; 6] = [
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-infobars",
    "--disable-extensions",
    "--no-first-run",
];

/// Everything needed to launch one browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub fingerprint: Fingerprint,
    pub headless: bool,
    /// Ask the engine to mask automation signals.
    pub stealth: bool,
    pub args: Vec<String>,
}

impl LaunchOptions {
    /// Headless, stealth on, automation-masking command-line flags.
    #[must_use]
    pub fn hardened(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            headless: true,
            stealth: true,
            args: HARDENED_ARGS.iter().map(|a| (*a).to_owned()).collect(),
        }
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Session: BrowserSession;

    /// Starts a fresh, isolated session. Nothing is shared between sessions.
    async fn launch(&self, options: LaunchOptions) -> Result<Self::Session, ScraperError>;

    /// Wall-clock time a navigation may take beyond its page-load timeout,
    /// for work the engine does around the load itself (queueing, browser
    /// start-up). Callers bound `goto` and `reload` by the timeout plus this.
    fn navigation_slack(&self) -> Duration {
        Duration::ZERO
    }
}

/// One page in one browser.
///
/// Engines that render over a request/response API (such as
/// [`BrowserlessDriver`]) have no live page between calls: `move_pointer`
/// can only be recorded, and `reload` renders the last URL again in a new
/// browser with the same fingerprint.
#[async_trait]
pub trait BrowserSession: Send {
    /// Moves the pointer to page coordinates `(x, y)`.
    async fn move_pointer(&mut self, x: u32, y: u32) -> Result<(), ScraperError>;

    /// Navigates and waits for the initial document load, giving up after
    /// `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// Reloads the current page.
    async fn reload(&mut self, timeout: Duration) -> Result<(), ScraperError>;

    /// Current document markup.
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// Releases the session. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), ScraperError>;
}
