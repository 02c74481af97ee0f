//! External SQL statement templates.
//!
//! Templates use `{name}` placeholders. Rendering substitutes the known
//! parameters and rejects any placeholder left over, so a typo in a template
//! fails before a statement reaches the warehouse.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::WarehouseError;
use crate::table::TableRef;

pub const MERGE_TEMPLATE_FILE: &str = "bulk_merge_data.sql";
pub const DELETE_TODAY_TEMPLATE_FILE: &str = "delete_today_data.sql";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid placeholder regex"));

#[derive(Debug, Clone)]
pub struct SqlTemplates {
    merge: String,
    delete_today: String,
}

impl SqlTemplates {
    /// Reads both templates from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Io`] if either file cannot be read.
    pub fn load(dir: &Path) -> Result<Self, WarehouseError> {
        Ok(Self {
            merge: read_template(&dir.join(MERGE_TEMPLATE_FILE))?,
            delete_today: read_template(&dir.join(DELETE_TODAY_TEMPLATE_FILE))?,
        })
    }

    #[must_use]
    pub fn from_strings(merge: &str, delete_today: &str) -> Self {
        Self {
            merge: merge.to_owned(),
            delete_today: delete_today.to_owned(),
        }
    }

    /// Merge statement from `staging` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Template`] if the template references an
    /// unknown placeholder.
    pub fn render_merge(&self, target: &TableRef, staging: &TableRef) -> Result<String, WarehouseError> {
        let staging = staging.to_string();
        render(
            MERGE_TEMPLATE_FILE,
            &self.merge,
            &[
                ("project", &target.project),
                ("dataset", &target.dataset),
                ("table", &target.table),
                ("temp_table", &staging),
            ],
        )
    }

    /// Delete statement for every `target` row with `scrape_date = date`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Template`] if the template references an
    /// unknown placeholder.
    pub fn render_delete_for_date(
        &self,
        target: &TableRef,
        date: NaiveDate,
    ) -> Result<String, WarehouseError> {
        let date = date.format("%Y-%m-%d").to_string();
        render(
            DELETE_TODAY_TEMPLATE_FILE,
            &self.delete_today,
            &[
                ("project", &target.project),
                ("dataset", &target.dataset),
                ("table", &target.table),
                ("scrape_date", &date),
            ],
        )
    }
}

fn read_template(path: &Path) -> Result<String, WarehouseError> {
    std::fs::read_to_string(path).map_err(|e| WarehouseError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn render(name: &str, template: &str, params: &[(&str, &str)]) -> Result<String, WarehouseError> {
    let mut unknown = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        let key = &caps[1];
        if let Some((_, value)) = params.iter().find(|(k, _)| *k == key) {
            (*value).to_owned()
        } else {
            unknown.get_or_insert_with(|| key.to_owned());
            caps[0].to_owned()
        }
    });

    match unknown {
        Some(key) => Err(WarehouseError::Template {
            name: name.to_owned(),
            reason: format!("unknown placeholder {{{key}}}"),
        }),
        None => Ok(rendered.into_owned()),
    }
}
