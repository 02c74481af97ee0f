//! CSV staging file written before each bulk load.

use std::path::Path;

use chrono::{NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

use sdbm_core::{RecordPayload, ScrapedRecord};

use crate::error::WarehouseError;

/// One staging row. Field order is the CSV column order and must match
/// [`crate::table::STAGING_SCHEMA`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRow {
    pub app_id: i64,
    pub title_name: String,
    pub current_followers: Option<u64>,
    pub positive_reviews: Option<u64>,
    pub negative_reviews: Option<u64>,
    pub owner_estimation: Option<u64>,
    /// RFC 3339 UTC with a `Z` suffix.
    pub scraped_at: String,
    pub scrape_date: NaiveDate,
}

impl StagingRow {
    /// `None` for records that carry an error instead of metrics.
    #[must_use]
    pub fn from_record(record: &ScrapedRecord) -> Option<Self> {
        let RecordPayload::Metrics(metrics) = &record.payload else {
            return None;
        };
        Some(Self {
            app_id: record.app_id,
            title_name: metrics.title.clone(),
            current_followers: metrics.current_followers,
            positive_reviews: metrics.positive_reviews,
            negative_reviews: metrics.negative_reviews,
            owner_estimation: metrics.owner_estimate,
            scraped_at: record
                .scraped_at
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            scrape_date: record.scrape_date,
        })
    }
}

/// Converts records to staging rows, skipping (and logging) error records.
#[must_use]
pub fn stage_rows(records: &[ScrapedRecord]) -> Vec<StagingRow> {
    records
        .iter()
        .filter_map(|record| {
            let row = StagingRow::from_record(record);
            if row.is_none() {
                tracing::warn!(
                    app_id = record.app_id,
                    error = record.error().unwrap_or_default(),
                    "skipping error record"
                );
            }
            row
        })
        .collect()
}

/// Writes `rows` to `path` with a header row. `None` fields become empty
/// cells.
///
/// # Errors
///
/// Returns [`WarehouseError::Csv`] if the file cannot be created or written.
pub fn write_staging_file(path: &Path, rows: &[StagingRow]) -> Result<(), WarehouseError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| WarehouseError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use sdbm_core::AppMetrics;

    use super::*;

    fn record(app_id: i64) -> ScrapedRecord {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 3, 4, 5).unwrap();
        ScrapedRecord::with_metrics(
            app_id,
            at,
            AppMetrics {
                title: "Half-Life, Source".to_owned(),
                current_followers: Some(1_200),
                positive_reviews: None,
                negative_reviews: Some(7),
                owner_estimate: Some(3_000_000),
            },
        )
    }

    #[test]
    fn error_records_are_not_staged() {
        let failed = ScrapedRecord::failed(130, Utc::now(), "navigation timed out after 30s");
        let rows = stage_rows(&[record(100), failed]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, 100);
    }

    #[test]
    fn csv_has_fixed_header_and_empty_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steam_metrics_1.csv");

        write_staging_file(&path, &stage_rows(&[record(100)])).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "app_id,title_name,current_followers,positive_reviews,negative_reviews,owner_estimation,scraped_at,scrape_date"
        );
        assert_eq!(
            lines.next().unwrap(),
            "100,\"Half-Life, Source\",1200,,7,3000000,2026-10-16T03:04:05.000000Z,2026-10-16"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn staged_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = stage_rows(&[record(100), record(130)]);

        write_staging_file(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let read: Vec<StagingRow> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(read, rows);
    }
}
