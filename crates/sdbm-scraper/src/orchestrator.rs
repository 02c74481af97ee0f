//! Serial scrape loop over a list of app ids.

use std::time::Duration;

use chrono::Utc;
use sdbm_core::ScrapedRecord;

use crate::fetch::{FetchOutcome, PageFetcher};
use crate::parse::parse_app_page;

/// Everything one scrape pass produced.
#[derive(Debug, Clone, Default)]
pub struct ScrapeBatch {
    /// Records with a metrics payload.
    pub successful: usize,
    /// One record per requested id, in request order.
    pub records: Vec<ScrapedRecord>,
}

impl ScrapeBatch {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.records.len() - self.successful
    }
}

/// Fetches and parses each app in order, sleeping `delay` between apps.
///
/// Apps are processed one at a time; a failure on one id produces an error
/// record for it and the loop moves on.
pub async fn scrape_all<F>(fetcher: &mut F, app_ids: &[i64], delay: Duration) -> ScrapeBatch
where
    F: PageFetcher + ?Sized,
{
    let total = app_ids.len();
    let mut batch = ScrapeBatch {
        successful: 0,
        records: Vec::with_capacity(total),
    };

    for (index, &app_id) in app_ids.iter().enumerate() {
        let position = index + 1;
        tracing::info!(app_id, "[{position}/{total}] scraping app");

        let outcome = fetcher.fetch(app_id).await;
        let record = record_from_outcome(app_id, outcome);

        match serde_json::to_string_pretty(&record) {
            Ok(json) => tracing::debug!(app_id, "extracted record:\n{json}"),
            Err(e) => tracing::debug!(app_id, error = %e, "could not serialize record"),
        }

        if record.is_success() {
            batch.successful += 1;
        }
        tracing::info!(
            app_id,
            success = record.is_success(),
            "[{position}/{total}] finished app"
        );
        batch.records.push(record);

        if position < total && !delay.is_zero() {
            tracing::info!(delay_secs = delay.as_secs(), "waiting before next app");
            tokio::time::sleep(delay).await;
        }
    }

    batch
}

fn record_from_outcome(app_id: i64, outcome: FetchOutcome) -> ScrapedRecord {
    match outcome {
        FetchOutcome::Failure(failure) => {
            tracing::warn!(app_id, reason = %failure, "no markup obtained");
            ScrapedRecord::failed(app_id, Utc::now(), failure.to_string())
        }
        other => {
            let markup = other.into_markup().unwrap_or_default();
            parse_app_page(&markup, app_id)
        }
    }
}
