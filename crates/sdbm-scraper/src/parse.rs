//! Metric extraction from a rendered SteamDB charts page.
//!
//! Every field is located independently, so a missing or reshuffled section
//! only blanks that one field. [`parse_app_page`] never panics and never
//! returns an error: the worst case is a record with an `Error` payload.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::LazyLock;

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};

use sdbm_core::{AppMetrics, ScrapedRecord, TITLE_NOT_FOUND};

use crate::parse_helpers::parse_number_with_suffix;

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"h1[itemprop="name"]"#));
static H3: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static LI: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static STRONG: LazyLock<Selector> = LazyLock::new(|| selector("strong"));
static TOOLTIP: LazyLock<Selector> = LazyLock::new(|| selector("span.tooltip"));
static TD: LazyLock<Selector> = LazyLock::new(|| selector("td"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid CSS")
}

/// Extracts a [`ScrapedRecord`] for `app_id` from page markup.
///
/// - Blank markup yields an error record.
/// - A field that cannot be located yields `None` (or the `"N/A"` title).
/// - A panic during extraction is caught and reported as an error record.
#[must_use]
pub fn parse_app_page(markup: &str, app_id: i64) -> ScrapedRecord {
    let scraped_at = Utc::now();

    if markup.trim().is_empty() {
        tracing::warn!(app_id, "no page markup to parse");
        return ScrapedRecord::failed(app_id, scraped_at, "empty page markup");
    }

    match catch_unwind(AssertUnwindSafe(|| extract_metrics(markup, app_id))) {
        Ok(metrics) => ScrapedRecord::with_metrics(app_id, scraped_at, metrics),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "page extraction panicked".to_owned());
            tracing::error!(app_id, error = %message, "page extraction failed");
            ScrapedRecord::failed(app_id, scraped_at, message)
        }
    }
}

fn extract_metrics(markup: &str, app_id: i64) -> AppMetrics {
    let document = Html::parse_document(markup);

    let title = extract_title(&document).unwrap_or_else(|| {
        tracing::warn!(app_id, field = "title", "field not found");
        TITLE_NOT_FOUND.to_owned()
    });

    let current_followers = numeric_field(
        app_id,
        "current_followers",
        extract_followers_text(&document),
    );

    let (positive_text, negative_text) = extract_review_texts(&document).unzip();
    let positive_reviews = numeric_field(app_id, "positive_reviews", positive_text);
    let negative_reviews = numeric_field(app_id, "negative_reviews", negative_text);

    let owner_estimate =
        numeric_field(app_id, "owner_estimate", extract_owners_text(&document));

    AppMetrics {
        title,
        current_followers,
        positive_reviews,
        negative_reviews,
        owner_estimate,
    }
}

/// Runs the shared suffix parser over a located field, logging when the
/// field is missing or unparseable.
fn numeric_field(app_id: i64, field: &'static str, text: Option<String>) -> Option<u64> {
    let Some(text) = text else {
        tracing::warn!(app_id, field, "field not found");
        return None;
    };
    let value = parse_number_with_suffix(&text);
    if value.is_none() {
        tracing::warn!(app_id, field, raw = %text, "field text is not numeric");
    }
    value
}

fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .next()
        .map(|h1| element_text(h1, " "))
        .filter(|t| !t.is_empty())
}

/// `<h3>Store data</h3><ul><li>Followers: 1.2K</li>...</ul>`
fn extract_followers_text(document: &Html) -> Option<String> {
    let header = document
        .select(&H3)
        .find(|h3| element_text(*h3, " ").to_lowercase().contains("store data"))?;
    let list = next_sibling_named(header, "ul")?;
    let first_item = list.select(&LI).next()?;
    Some(element_text(first_item, " "))
}

/// `<div><strong>User reviews</strong> <span class="tooltip">1,234 positive<br>56 negative</span></div>`
///
/// Returns the positive and negative fragments; both must be present.
fn extract_review_texts(document: &Html) -> Option<(String, String)> {
    let label = document
        .select(&STRONG)
        .find(|s| element_text(*s, " ").to_lowercase().contains("user reviews"))?;
    let container = label.parent().and_then(ElementRef::wrap)?;
    let tooltip = container.select(&TOOLTIP).next()?;

    let joined = element_text(tooltip, "|");
    let mut parts = joined
        .split('|')
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let positive = parts.next()?.to_owned();
    let negative = parts.next()?.to_owned();
    Some((positive, negative))
}

/// `<tr><td>Owners</td><td>1,000,000 ± 50,000</td></tr>`
fn extract_owners_text(document: &Html) -> Option<String> {
    let label = document
        .select(&TD)
        .find(|td| element_text(*td, " ") == "Owners")?;
    let value = next_sibling_named(label, "td")?;
    let text = element_text(value, " ");
    let estimate = text.split('±').next().unwrap_or_default().trim();
    Some(estimate.to_owned())
}

/// Trimmed, non-empty text fragments of `element` joined with `separator`.
fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn next_sibling_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == name)
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
