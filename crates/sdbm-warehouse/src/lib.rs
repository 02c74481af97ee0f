//! Warehouse persistence for scraped app metrics.
//!
//! [`WarehouseWriter`] stages records to CSV, bulk-loads them into a
//! per-run staging table, and merges that table into the permanent metrics
//! table keyed by `(app_id, scrape_date)`. The warehouse itself sits behind
//! the [`Warehouse`] trait; [`BigQueryClient`] is the production backend.

pub mod bigquery;
pub mod error;
pub mod sql;
pub mod staging;
pub mod table;
pub mod warehouse;
pub mod writer;

pub use bigquery::BigQueryClient;
pub use error::WarehouseError;
pub use sql::SqlTemplates;
pub use staging::StagingRow;
pub use table::{FieldType, SchemaField, TableRef, STAGING_SCHEMA};
pub use warehouse::{QueryStats, Warehouse};
pub use writer::{WarehouseWriter, WriteOutcome};
