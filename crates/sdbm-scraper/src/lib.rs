//! Page retrieval and metric extraction for SteamDB app charts pages.
//!
//! The [`fetch::FetchStrategy`] drives a browser session with a randomized
//! fingerprint and falls back to an unlocking service when a bot challenge
//! is detected. [`parse::parse_app_page`] turns whatever markup came back
//! into a [`sdbm_core::ScrapedRecord`], and [`orchestrator::scrape_all`]
//! sequences both across many app ids.

pub mod browser;
pub mod catalog;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod orchestrator;
pub mod parse;
pub mod unlocker;

mod parse_helpers;

pub use browser::{BrowserDriver, BrowserSession, BrowserlessDriver, LaunchOptions};
pub use catalog::CatalogClient;
pub use error::ScraperError;
pub use fetch::{FetchFailure, FetchOutcome, FetchSettings, FetchStrategy, PageFetcher};
pub use fingerprint::{Fingerprint, FingerprintPools, RandomSource, StdRandom};
pub use orchestrator::{scrape_all, ScrapeBatch};
pub use parse::parse_app_page;
pub use parse_helpers::parse_number_with_suffix;
pub use unlocker::UnlockerClient;
