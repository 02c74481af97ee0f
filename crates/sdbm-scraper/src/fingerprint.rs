//! Randomized but internally consistent browser fingerprints.
//!
//! A [`Fingerprint`] bundles the user agent, request headers, locale,
//! timezone, color scheme and viewport a browser session presents. Every
//! random choice goes through a [`RandomSource`] so tests can pin the
//! selection with a seeded or fixed source.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const USER_AGENTS: [&str; 10] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:131.0) Gecko/20100101 Firefox/131.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const TIMEZONES: [&str; 3] = ["Asia/Tokyo", "America/New_York", "Europe/London"];

const DOCUMENT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const SAFARI_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Source of randomness for fingerprint and timing choices.
pub trait RandomSource: Send {
    /// Index in `0..len`. `len` is always at least 1.
    fn index(&mut self, len: usize) -> usize;

    /// Value in `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;

    /// Value in `[low, high]`.
    fn between(&mut self, low: u32, high: u32) -> u32;
}

/// [`RandomSource`] backed by `rand`'s standard RNG.
pub struct StdRandom(StdRng);

impl StdRandom {
    /// Seeded from the operating system; use for production runs.
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }

    /// Deterministic sequence for reproducible runs and tests.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for StdRandom {
    fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.0.random_range(0..len)
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.0.random_range(low..=high)
    }

    fn between(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        self.0.random_range(low..=high)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    Safari,
    Other,
}

impl BrowserFamily {
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Firefox/") {
            Self::Firefox
        } else if user_agent.contains("Edg/") {
            Self::Edge
        } else if user_agent.contains("Chrome/") {
            Self::Chrome
        } else if user_agent.contains("Safari/") {
            Self::Safari
        } else {
            Self::Other
        }
    }

    /// Chromium-based browsers send `sec-ch-ua` client hints.
    #[must_use]
    pub fn sends_client_hints(self) -> bool {
        matches!(self, Self::Chrome | Self::Edge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Unknown,
}

impl Platform {
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Windows") {
            Self::Windows
        } else if user_agent.contains("Macintosh") || user_agent.contains("Mac OS X") {
            Self::MacOs
        } else if user_agent.contains("Linux") || user_agent.contains("X11") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    /// Value for the `sec-ch-ua-platform` header.
    #[must_use]
    pub fn client_hint(self) -> &'static str {
        match self {
            Self::Windows => "\"Windows\"",
            Self::MacOs => "\"macOS\"",
            Self::Linux => "\"Linux\"",
            Self::Unknown => "\"Unknown\"",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// A locale and the `Accept-Language` values a browser set to it would send.
#[derive(Debug, Clone)]
pub struct LocaleProfile {
    pub locale: String,
    pub accept_languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Option pools the fingerprint is drawn from.
#[derive(Debug, Clone)]
pub struct FingerprintPools {
    pub user_agents: Vec<String>,
    pub locales: Vec<LocaleProfile>,
    pub timezones: Vec<String>,
    pub color_schemes: Vec<ColorScheme>,
    pub viewport: Viewport,
    /// Inclusive range for `deviceScaleFactor`.
    pub device_scale_factor: (f64, f64),
}

impl Default for FingerprintPools {
    fn default() -> Self {
        Self {
            user_agents: USER_AGENTS.iter().map(|s| (*s).to_owned()).collect(),
            locales: vec![
                LocaleProfile {
                    locale: "ja-JP".to_owned(),
                    accept_languages: vec![
                        "ja-JP,ja;q=0.9,en-US;q=0.8,en;q=0.7".to_owned(),
                        "ja,en-US;q=0.9,en;q=0.8".to_owned(),
                    ],
                },
                LocaleProfile {
                    locale: "en-US".to_owned(),
                    accept_languages: vec!["en-US,en;q=0.9,ja;q=0.8".to_owned()],
                },
            ],
            timezones: TIMEZONES.iter().map(|s| (*s).to_owned()).collect(),
            color_schemes: vec![ColorScheme::Light, ColorScheme::Dark],
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            device_scale_factor: (1.0, 2.0),
        }
    }
}

/// Everything a browser session presents to the target site.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub user_agent: String,
    pub family: BrowserFamily,
    pub platform: Platform,
    pub locale: String,
    pub timezone: String,
    pub color_scheme: ColorScheme,
    pub viewport: Viewport,
    pub device_scale_factor: f64,
    /// Extra request headers, consistent with `user_agent` and `locale`.
    pub headers: BTreeMap<String, String>,
}

impl FingerprintPools {
    /// Draws a fingerprint from the pools.
    ///
    /// Empty pools fall back to the built-in defaults for that dimension.
    pub fn draw<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Fingerprint {
        let defaults = Self::default();

        let user_agent = pick(rng, &self.user_agents)
            .or_else(|| pick(rng, &defaults.user_agents))
            .cloned()
            .unwrap_or_default();
        let locale = pick(rng, &self.locales)
            .or_else(|| pick(rng, &defaults.locales))
            .cloned()
            .unwrap_or_else(|| LocaleProfile {
                locale: "en-US".to_owned(),
                accept_languages: Vec::new(),
            });
        let accept_language = pick(rng, &locale.accept_languages)
            .cloned()
            .unwrap_or_else(|| format!("{},en;q=0.9", locale.locale));
        let timezone = pick(rng, &self.timezones)
            .or_else(|| pick(rng, &defaults.timezones))
            .cloned()
            .unwrap_or_else(|| "UTC".to_owned());
        let color_scheme = pick(rng, &self.color_schemes)
            .copied()
            .unwrap_or(ColorScheme::Light);
        let (low, high) = self.device_scale_factor;
        let device_scale_factor = rng.uniform(low, high);

        let family = BrowserFamily::from_user_agent(&user_agent);
        let platform = Platform::from_user_agent(&user_agent);
        let headers = browser_headers(&user_agent, family, platform, &accept_language);

        Fingerprint {
            user_agent,
            family,
            platform,
            locale: locale.locale,
            timezone,
            color_scheme,
            viewport: self.viewport,
            device_scale_factor,
            headers,
        }
    }
}

fn pick<'a, T, R: RandomSource + ?Sized>(rng: &mut R, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(rng.index(items.len()))
}

/// Builds the navigation header set for a user agent.
///
/// Client hints are only emitted for Chromium browsers and always name the
/// same platform and major version as the user agent string.
fn browser_headers(
    user_agent: &str,
    family: BrowserFamily,
    platform: Platform,
    accept_language: &str,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let accept = if family == BrowserFamily::Safari {
        SAFARI_ACCEPT
    } else {
        DOCUMENT_ACCEPT
    };

    for (name, value) in [
        ("Accept", accept),
        ("Accept-Language", accept_language),
        ("Accept-Encoding", "gzip, deflate, br, zstd"),
        ("DNT", "1"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Cache-Control", "max-age=0"),
    ] {
        headers.insert(name.to_owned(), value.to_owned());
    }

    if family.sends_client_hints() {
        let major = chromium_major_version(user_agent).unwrap_or("131");
        let brand = if family == BrowserFamily::Edge {
            "Microsoft Edge"
        } else {
            "Google Chrome"
        };
        headers.insert(
            "sec-ch-ua".to_owned(),
            format!("\"{brand}\";v=\"{major}\", \"Chromium\";v=\"{major}\", \"Not_A Brand\";v=\"24\""),
        );
        headers.insert("sec-ch-ua-mobile".to_owned(), "?0".to_owned());
        headers.insert(
            "sec-ch-ua-platform".to_owned(),
            platform.client_hint().to_owned(),
        );
    }

    headers
}

fn chromium_major_version(user_agent: &str) -> Option<&str> {
    let start = user_agent.find("Chrome/")? + "Chrome/".len();
    let rest = &user_agent[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Always picks the element at a fixed offset and the low end of ranges.
    struct FixedRandom(usize);

    impl RandomSource for FixedRandom {
        fn index(&mut self, len: usize) -> usize {
            self.0 % len
        }
        fn uniform(&mut self, low: f64, _high: f64) -> f64 {
            low
        }
        fn between(&mut self, low: u32, _high: u32) -> u32 {
            low
        }
    }

    fn pools_with_agent(agent: &str) -> FingerprintPools {
        FingerprintPools {
            user_agents: vec![agent.to_owned()],
            ..FingerprintPools::default()
        }
    }

    #[test]
    fn chrome_windows_hints_match_user_agent() {
        let fp = pools_with_agent(USER_AGENTS[0]).draw(&mut FixedRandom(0));
        assert_eq!(fp.family, BrowserFamily::Chrome);
        assert_eq!(fp.headers["sec-ch-ua-platform"], "\"Windows\"");
        assert!(fp.headers["sec-ch-ua"].contains("\"Google Chrome\";v=\"131\""));
        assert_eq!(fp.headers["sec-ch-ua-mobile"], "?0");
    }

    #[test]
    fn chrome_mac_hints_report_macos() {
        let fp = pools_with_agent(USER_AGENTS[3]).draw(&mut FixedRandom(0));
        assert_eq!(fp.platform, Platform::MacOs);
        assert_eq!(fp.headers["sec-ch-ua-platform"], "\"macOS\"");
        assert!(fp.headers["sec-ch-ua"].contains("v=\"130\""));
    }

    #[test]
    fn edge_reports_edge_brand() {
        let fp = pools_with_agent(USER_AGENTS[9]).draw(&mut FixedRandom(0));
        assert_eq!(fp.family, BrowserFamily::Edge);
        assert!(fp.headers["sec-ch-ua"].starts_with("\"Microsoft Edge\""));
    }

    #[test]
    fn firefox_sends_no_client_hints() {
        let fp = pools_with_agent(USER_AGENTS[5]).draw(&mut FixedRandom(0));
        assert_eq!(fp.family, BrowserFamily::Firefox);
        assert!(!fp.headers.contains_key("sec-ch-ua"));
        assert!(!fp.headers.contains_key("sec-ch-ua-platform"));
    }

    #[test]
    fn safari_uses_narrow_accept_and_no_hints() {
        let fp = pools_with_agent(USER_AGENTS[8]).draw(&mut FixedRandom(0));
        assert_eq!(fp.family, BrowserFamily::Safari);
        assert_eq!(fp.headers["Accept"], SAFARI_ACCEPT);
        assert!(!fp.headers.contains_key("sec-ch-ua"));
    }

    #[test]
    fn accept_language_follows_locale() {
        let pools = FingerprintPools::default();
        for offset in 0..4 {
            let fp = pools.draw(&mut FixedRandom(offset));
            let primary = fp.locale.split('-').next().unwrap();
            assert!(
                fp.headers["Accept-Language"].starts_with(primary),
                "locale {} with Accept-Language {}",
                fp.locale,
                fp.headers["Accept-Language"]
            );
        }
    }

    #[test]
    fn every_default_agent_is_self_consistent() {
        for agent in USER_AGENTS {
            let fp = pools_with_agent(agent).draw(&mut StdRandom::seeded(11));
            assert_eq!(fp.user_agent, agent);
            if let Some(platform) = fp.headers.get("sec-ch-ua-platform") {
                assert_eq!(platform, fp.platform.client_hint(), "agent: {agent}");
                assert!(fp.family.sends_client_hints(), "agent: {agent}");
            }
        }
    }

    #[test]
    fn seeded_source_is_deterministic() {
        let pools = FingerprintPools::default();
        let a = pools.draw(&mut StdRandom::seeded(42));
        let b = pools.draw(&mut StdRandom::seeded(42));
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.locale, b.locale);
        assert_eq!(a.timezone, b.timezone);
        assert_eq!(a.headers, b.headers);
        assert!((a.device_scale_factor - b.device_scale_factor).abs() < f64::EPSILON);
    }

    #[test]
    fn scale_factor_stays_in_range() {
        let pools = FingerprintPools::default();
        let mut rng = StdRandom::seeded(3);
        for _ in 0..50 {
            let fp = pools.draw(&mut rng);
            assert!((1.0..=2.0).contains(&fp.device_scale_factor));
        }
    }

    #[test]
    fn empty_pools_fall_back_to_defaults() {
        let pools = FingerprintPools {
            user_agents: Vec::new(),
            locales: Vec::new(),
            timezones: Vec::new(),
            color_schemes: Vec::new(),
            ..FingerprintPools::default()
        };
        let fp = pools.draw(&mut FixedRandom(0));
        assert_eq!(fp.user_agent, USER_AGENTS[0]);
        assert_eq!(fp.timezone, TIMEZONES[0]);
        assert_eq!(fp.color_scheme, ColorScheme::Light);
    }

    #[test]
    fn chromium_version_parsing() {
        assert_eq!(chromium_major_version(USER_AGENTS[1]), Some("130"));
        assert_eq!(chromium_major_version(USER_AGENTS[5]), None);
    }
}
