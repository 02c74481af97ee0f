//! Table identifiers and load schemas.

use std::fmt;

use serde::Serialize;

/// Fully qualified `project.dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    #[must_use]
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_owned(),
            dataset: dataset.to_owned(),
            table: table.to_owned(),
        }
    }

    /// Per-run staging table in the same dataset.
    #[must_use]
    pub fn staging(&self, suffix: i64) -> Self {
        Self {
            project: self.project.clone(),
            dataset: self.dataset.clone(),
            table: format!("temp_steam_metrics_{suffix}"),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Integer,
    String,
    Timestamp,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

const fn field(name: &'static str, field_type: FieldType) -> SchemaField {
    SchemaField { name, field_type }
}

/// Column order and types of the staging CSV.
pub const STAGING_SCHEMA: [SchemaField; 8] = [
    field("app_id", FieldType::Integer),
    field("title_name", FieldType::String),
    field("current_followers", FieldType::Integer),
    field("positive_reviews", FieldType::Integer),
    field("negative_reviews", FieldType::Integer),
    field("owner_estimation", FieldType::Integer),
    field("scraped_at", FieldType::Timestamp),
    field("scrape_date", FieldType::Date),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_table_shares_dataset() {
        let target = TableRef::new("proj", "steam_data", "steam_app_metrics");
        let staging = target.staging(1_760_000_000_123);
        assert_eq!(
            staging.to_string(),
            "proj.steam_data.temp_steam_metrics_1760000000123"
        );
    }

    #[test]
    fn schema_serializes_with_upper_case_types() {
        let json = serde_json::to_value(&STAGING_SCHEMA[6]).unwrap();
        assert_eq!(json, serde_json::json!({"name": "scraped_at", "type": "TIMESTAMP"}));
    }
}
