//! Idempotent batch write: stage, bulk load, keyed merge, clean up.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};

use sdbm_core::ScrapedRecord;

use crate::error::WarehouseError;
use crate::sql::SqlTemplates;
use crate::staging::{stage_rows, write_staging_file, StagingRow};
use crate::table::{TableRef, STAGING_SCHEMA};
use crate::warehouse::{QueryStats, Warehouse};

/// How a write finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Merged { rows: usize, stats: QueryStats },
    /// No metric records to write.
    NothingToWrite,
    /// The merge was rejected because the target still has streamed rows
    /// in its buffer; those rows already hold the data.
    StreamingBufferSkipped,
}

pub struct WarehouseWriter<W> {
    warehouse: W,
    target: TableRef,
    templates: SqlTemplates,
    staging_dir: PathBuf,
}

impl<W: Warehouse> WarehouseWriter<W> {
    pub fn new(warehouse: W, target: TableRef, templates: SqlTemplates, staging_dir: PathBuf) -> Self {
        Self {
            warehouse,
            target,
            templates,
            staging_dir,
        }
    }

    #[must_use]
    pub fn target(&self) -> &TableRef {
        &self.target
    }

    /// Merges `records` into the target table.
    ///
    /// Returns `true` when the rows are durably merged or there was nothing
    /// to do. Failures are logged, never returned.
    pub async fn write(&self, records: &[ScrapedRecord]) -> bool {
        match self.try_write(records).await {
            Ok(WriteOutcome::Merged { rows, stats }) => {
                tracing::info!(
                    table = %self.target,
                    rows,
                    inserted = stats.inserted_rows,
                    updated = stats.updated_rows,
                    "merge complete"
                );
                true
            }
            Ok(WriteOutcome::NothingToWrite | WriteOutcome::StreamingBufferSkipped) => true,
            Err(e) => {
                tracing::error!(table = %self.target, error = %e, "warehouse write failed");
                false
            }
        }
    }

    /// [`write`](Self::write) with the outcome and error surfaced.
    ///
    /// The staging table and staging file are removed on every path once
    /// staging has started.
    ///
    /// # Errors
    ///
    /// Returns the first staging, load, or merge error, except a streaming
    /// buffer conflict during the merge.
    pub async fn try_write(&self, records: &[ScrapedRecord]) -> Result<WriteOutcome, WarehouseError> {
        let rows = stage_rows(records);
        if rows.is_empty() {
            tracing::warn!(records = records.len(), "no metric records to write");
            return Ok(WriteOutcome::NothingToWrite);
        }

        let suffix = Utc::now().timestamp_millis();
        let staging_file = self.staging_dir.join(format!("steam_metrics_{suffix}.csv"));
        let staging_table = self.target.staging(suffix);

        let outcome = match self.stage_and_load(&rows, &staging_file, &staging_table).await {
            Ok(()) => self.merge(&staging_table, rows.len()).await,
            Err(e) => Err(e),
        };

        self.clean_up(&staging_file, &staging_table).await;
        outcome
    }

    /// Deletes every target row whose `scrape_date` is today (UTC).
    pub async fn clear_today(&self) -> bool {
        self.clear_date(Utc::now().date_naive()).await
    }

    /// Deletes every target row whose `scrape_date` is `date`.
    pub async fn clear_date(&self, date: NaiveDate) -> bool {
        let result = match self.templates.render_delete_for_date(&self.target, date) {
            Ok(sql) => self.warehouse.run_query(&sql).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(stats) => {
                tracing::info!(
                    table = %self.target,
                    %date,
                    deleted = stats.deleted_rows,
                    "cleared rows for date"
                );
                true
            }
            Err(e) => {
                tracing::error!(table = %self.target, %date, error = %e, "failed to clear rows");
                false
            }
        }
    }

    async fn stage_and_load(
        &self,
        rows: &[StagingRow],
        staging_file: &Path,
        staging_table: &TableRef,
    ) -> Result<(), WarehouseError> {
        write_staging_file(staging_file, rows)?;
        tracing::info!(path = %staging_file.display(), rows = rows.len(), "staging file written");

        self.warehouse
            .load_csv(staging_file, staging_table, &STAGING_SCHEMA)
            .await?;
        tracing::info!(table = %staging_table, "staging table loaded");
        Ok(())
    }

    async fn merge(&self, staging_table: &TableRef, rows: usize) -> Result<WriteOutcome, WarehouseError> {
        let sql = self.templates.render_merge(&self.target, staging_table)?;
        tracing::info!(table = %self.target, "starting merge");

        match self.warehouse.run_query(&sql).await {
            Ok(stats) => Ok(WriteOutcome::Merged { rows, stats }),
            Err(e) if e.is_streaming_buffer_conflict() => {
                tracing::warn!(table = %self.target, error = %e, "merge skipped: rows still in streaming buffer");
                Ok(WriteOutcome::StreamingBufferSkipped)
            }
            Err(e) => Err(e),
        }
    }

    async fn clean_up(&self, staging_file: &Path, staging_table: &TableRef) {
        match self.warehouse.drop_table(staging_table).await {
            Ok(()) => tracing::info!(table = %staging_table, "staging table dropped"),
            Err(e) => tracing::warn!(table = %staging_table, error = %e, "failed to drop staging table"),
        }

        match tokio::fs::remove_file(staging_file).await {
            Ok(()) => tracing::debug!(path = %staging_file.display(), "staging file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %staging_file.display(),
                error = %e,
                "failed to remove staging file"
            ),
        }
    }
}
