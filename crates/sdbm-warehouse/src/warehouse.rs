use std::path::Path;

use async_trait::async_trait;

use crate::error::WarehouseError;
use crate::table::{SchemaField, TableRef};

/// Row counts reported by a finished DML statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub inserted_rows: i64,
    pub updated_rows: i64,
    pub deleted_rows: i64,
}

/// The three warehouse operations the writer needs.
///
/// Every call blocks until the warehouse reports the job as finished.
#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<QueryStats, WarehouseError>;

    /// Loads a headered CSV file into `table`, replacing its contents.
    async fn load_csv(
        &self,
        path: &Path,
        table: &TableRef,
        schema: &[SchemaField],
    ) -> Result<(), WarehouseError>;

    /// Drops `table`. Dropping a table that does not exist succeeds.
    async fn drop_table(&self, table: &TableRef) -> Result<(), WarehouseError>;
}
