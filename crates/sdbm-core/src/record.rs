//! Scraped metric records.
//!
//! A [`ScrapedRecord`] is created once per app per run and never mutated
//! afterwards. The payload is either a metric set (individual fields may be
//! `None` when the page section was missing) or an error message, never both.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Title placeholder used when the page heading could not be located.
pub const TITLE_NOT_FOUND: &str = "N/A";

/// Metrics extracted from one app's charts page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppMetrics {
    pub title: String,
    pub current_followers: Option<u64>,
    pub positive_reviews: Option<u64>,
    pub negative_reviews: Option<u64>,
    pub owner_estimate: Option<u64>,
}

impl AppMetrics {
    /// A metric set with the title sentinel and every count missing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            title: TITLE_NOT_FOUND.to_owned(),
            current_followers: None,
            positive_reviews: None,
            negative_reviews: None,
            owner_estimate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPayload {
    Metrics(AppMetrics),
    Error(String),
}

/// One row of extracted metrics for one app at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedRecord {
    pub app_id: i64,
    pub scraped_at: DateTime<Utc>,
    /// UTC calendar date of `scraped_at`; merge key together with `app_id`.
    pub scrape_date: NaiveDate,
    pub payload: RecordPayload,
}

impl ScrapedRecord {
    #[must_use]
    pub fn with_metrics(app_id: i64, scraped_at: DateTime<Utc>, metrics: AppMetrics) -> Self {
        Self {
            app_id,
            scraped_at,
            scrape_date: scraped_at.date_naive(),
            payload: RecordPayload::Metrics(metrics),
        }
    }

    #[must_use]
    pub fn failed(app_id: i64, scraped_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            app_id,
            scraped_at,
            scrape_date: scraped_at.date_naive(),
            payload: RecordPayload::Error(error.into()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> Option<&AppMetrics> {
        match &self.payload {
            RecordPayload::Metrics(m) => Some(m),
            RecordPayload::Error(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.payload {
            RecordPayload::Metrics(_) => None,
            RecordPayload::Error(e) => Some(e),
        }
    }

    /// `true` when the record carries a metric set rather than an error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.metrics().is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn late_evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 9, 23, 59, 58).unwrap()
    }

    #[test]
    fn scrape_date_is_utc_date_of_scraped_at() {
        let record = ScrapedRecord::with_metrics(100, late_evening(), AppMetrics::empty());
        assert_eq!(
            record.scrape_date,
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
    }

    #[test]
    fn failed_record_has_error_and_no_metrics() {
        let record = ScrapedRecord::failed(130, late_evening(), "no markup");
        assert!(!record.is_success());
        assert_eq!(record.error(), Some("no markup"));
        assert!(record.metrics().is_none());
    }

    #[test]
    fn metrics_record_has_no_error() {
        let record = ScrapedRecord::with_metrics(130, late_evening(), AppMetrics::empty());
        assert!(record.is_success());
        assert!(record.error().is_none());
        assert_eq!(record.metrics().unwrap().title, TITLE_NOT_FOUND);
    }

    #[test]
    fn serializes_payload_with_snake_case_tag() {
        let record = ScrapedRecord::failed(7, late_evening(), "boom");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["app_id"], 7);
        assert_eq!(value["scrape_date"], "2025-03-09");
        assert_eq!(value["payload"]["error"], "boom");
    }
}
