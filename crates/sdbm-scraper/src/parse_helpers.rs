//! Numeric text helpers shared by every metric field.
//!
//! SteamDB renders counts in several shapes: `"1,234"`, `"1.2K"`, `"~3M"`,
//! `"12.5 M"`. All four extracted fields go through
//! [`parse_number_with_suffix`] so they normalize identically.

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_WITH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"~?([\d.,]+)\s*([kmbKMB]?)").expect("valid number-with-suffix regex")
});

/// Parses the first number in `text`, honoring a `K`/`M`/`B` magnitude
/// suffix and thousands separators.
///
/// A leading `~` (SteamDB's "approximately") is ignored. The scaled value is
/// truncated toward zero.
///
/// Returns `None` when `text` contains no numeric run or the run does not
/// parse as a number (e.g. `"..."`).
///
/// ```
/// use sdbm_scraper::parse_number_with_suffix;
///
/// assert_eq!(parse_number_with_suffix("1.2K"), Some(1_200));
/// assert_eq!(parse_number_with_suffix("~3M"), Some(3_000_000));
/// assert_eq!(parse_number_with_suffix("N/A"), None);
/// ```
#[must_use]
pub fn parse_number_with_suffix(text: &str) -> Option<u64> {
    let caps = NUMBER_WITH_SUFFIX.captures(text.trim())?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    let number = digits.parse::<f64>().ok()?;

    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        Some("b") => 1_000_000_000.0,
        _ => 1.0,
    };

    let scaled = number * multiplier;
    if !scaled.is_finite() || scaled < 0.0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(scaled.trunc() as u64)
}
