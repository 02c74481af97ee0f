use std::sync::{Arc, Mutex};

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::fingerprint::StdRandom;

const NORMAL_PAGE: &str = r#"<html><body><h1 itemprop="name">Half-Life</h1></body></html>"#;
const CHALLENGE_PAGE: &str =
    "<html><head><title>Just a moment...</title></head><body>Checking your browser</body></html>";
const UNLOCKED_PAGE: &str = r#"<html><body><h1 itemprop="name">Unlocked</h1></body></html>"#;

// -----------------------------------------------------------------------
// Scripted browser
// -----------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    Page(&'static str),
    /// Loads the page after the given delay.
    Slow(Duration, &'static str),
    Hang,
    Fail,
}

#[derive(Debug, Default)]
struct Calls {
    launches: Vec<LaunchOptions>,
    gotos: Vec<String>,
    pointer: Vec<(u32, u32)>,
    reloads: usize,
    closes: usize,
}

#[derive(Clone)]
struct FakeDriver {
    launch_fails: bool,
    slack: Duration,
    goto: Step,
    reload: Step,
    calls: Arc<Mutex<Calls>>,
}

impl FakeDriver {
    fn new(goto: Step, reload: Step) -> Self {
        Self {
            launch_fails: false,
            slack: Duration::ZERO,
            goto,
            reload,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }
}

struct FakeSession {
    goto: Step,
    reload: Step,
    current: Option<&'static str>,
    calls: Arc<Mutex<Calls>>,
}

impl FakeSession {
    async fn apply(&mut self, step: Step) -> Result<(), ScraperError> {
        match step {
            Step::Page(markup) => {
                self.current = Some(markup);
                Ok(())
            }
            Step::Slow(delay, markup) => {
                tokio::time::sleep(delay).await;
                self.current = Some(markup);
                Ok(())
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
            Step::Fail => Err(ScraperError::Browser("net::ERR_CONNECTION_RESET".to_owned())),
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Session = FakeSession;

    async fn launch(&self, options: LaunchOptions) -> Result<FakeSession, ScraperError> {
        if self.launch_fails {
            return Err(ScraperError::Browser("no browser available".to_owned()));
        }
        self.calls.lock().unwrap().launches.push(options);
        Ok(FakeSession {
            goto: self.goto.clone(),
            reload: self.reload.clone(),
            current: None,
            calls: Arc::clone(&self.calls),
        })
    }

    fn navigation_slack(&self) -> Duration {
        self.slack
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn move_pointer(&mut self, x: u32, y: u32) -> Result<(), ScraperError> {
        self.calls.lock().unwrap().pointer.push((x, y));
        Ok(())
    }

    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), ScraperError> {
        self.calls.lock().unwrap().gotos.push(url.to_owned());
        self.apply(self.goto.clone()).await
    }

    async fn reload(&mut self, _timeout: Duration) -> Result<(), ScraperError> {
        self.calls.lock().unwrap().reloads += 1;
        self.apply(self.reload.clone()).await
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        self.current
            .map(str::to_owned)
            .ok_or_else(|| ScraperError::Browser("no page".to_owned()))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.calls.lock().unwrap().closes += 1;
        Ok(())
    }
}

fn settings() -> FetchSettings {
    FetchSettings::new("https://steamdb.test/", Duration::from_millis(50)).without_delays()
}

fn strategy(
    driver: FakeDriver,
    unlocker: Option<UnlockerClient>,
) -> FetchStrategy<FakeDriver, StdRandom> {
    FetchStrategy::new(driver, unlocker, StdRandom::seeded(7), settings())
}

async fn unlocker_returning(status: u16, body: &str) -> (MockServer, UnlockerClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/request"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "zone": "test_zone",
            "format": "raw",
        })))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    let client =
        UnlockerClient::new(&format!("{}/request", server.uri()), "test-token", "test_zone", 5)
            .unwrap();
    (server, client)
}

// -----------------------------------------------------------------------
// Challenge detection
// -----------------------------------------------------------------------

#[test]
fn challenge_markers_are_case_insensitive() {
    assert!(looks_like_challenge(CHALLENGE_PAGE));
    assert!(looks_like_challenge("<script src=\"/cdn-cgi/challenge-platform/h/b\"></script>"));
    assert!(looks_like_challenge("<form id=\"challenge-form\" class=\"CF-CHL-widget\">"));
    assert!(!looks_like_challenge(NORMAL_PAGE));
}

#[test]
fn cdn_mention_alone_is_not_a_challenge() {
    assert!(!looks_like_challenge(
        "<footer>Performance &amp; security by Cloudflare</footer>"
    ));
}

#[test]
fn app_url_uses_charts_path() {
    assert_eq!(settings().app_url(730), "https://steamdb.test/app/730/charts/");
}

// -----------------------------------------------------------------------
// Flow
// -----------------------------------------------------------------------

#[tokio::test]
async fn normal_page_is_success() {
    let driver = FakeDriver::new(Step::Page(NORMAL_PAGE), Step::Fail);
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, None).fetch_page(10).await;

    assert_eq!(outcome, FetchOutcome::Success(NORMAL_PAGE.to_owned()));
    let calls = calls.lock().unwrap();
    assert_eq!(calls.gotos, vec!["https://steamdb.test/app/10/charts/"]);
    assert_eq!(calls.reloads, 0);
    assert_eq!(calls.closes, 1);
}

#[tokio::test]
async fn pointer_moves_inside_idle_box_before_navigation() {
    let driver = FakeDriver::new(Step::Page(NORMAL_PAGE), Step::Fail);
    let calls = Arc::clone(&driver.calls);

    strategy(driver, None).fetch_page(10).await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.pointer.len(), 1);
    let (x, y) = calls.pointer[0];
    assert!((50..=200).contains(&x) && (50..=200).contains(&y));
}

#[tokio::test]
async fn session_is_launched_hardened() {
    let driver = FakeDriver::new(Step::Page(NORMAL_PAGE), Step::Fail);
    let calls = Arc::clone(&driver.calls);

    strategy(driver, None).fetch_page(10).await;

    let calls = calls.lock().unwrap();
    let options = &calls.launches[0];
    assert!(options.stealth);
    assert!(options
        .args
        .contains(&"--disable-blink-features=AutomationControlled".to_owned()));
}

#[tokio::test]
async fn challenge_with_working_unlocker_uses_unlocked_markup() {
    let (_server, unlocker) = unlocker_returning(200, UNLOCKED_PAGE).await;
    let driver = FakeDriver::new(Step::Page(CHALLENGE_PAGE), Step::Page(NORMAL_PAGE));
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, Some(unlocker)).fetch_page(20).await;

    assert_eq!(
        outcome,
        FetchOutcome::ChallengeFallbackSucceeded(UNLOCKED_PAGE.to_owned())
    );
    let calls = calls.lock().unwrap();
    assert_eq!(calls.reloads, 0, "no reload once the unlocker succeeded");
    assert_eq!(calls.closes, 1);
}

#[tokio::test]
async fn challenge_with_failing_unlocker_reloads_once() {
    let (_server, unlocker) = unlocker_returning(502, "upstream error").await;
    let driver = FakeDriver::new(Step::Page(CHALLENGE_PAGE), Step::Page(NORMAL_PAGE));
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, Some(unlocker)).fetch_page(30).await;

    assert_eq!(
        outcome,
        FetchOutcome::ChallengeFallbackFailed(NORMAL_PAGE.to_owned())
    );
    let calls = calls.lock().unwrap();
    assert_eq!(calls.reloads, 1);
    assert_eq!(calls.closes, 1);
}

#[tokio::test]
async fn challenge_without_unlocker_falls_back_to_reload() {
    let driver = FakeDriver::new(Step::Page(CHALLENGE_PAGE), Step::Page(CHALLENGE_PAGE));

    let outcome = strategy(driver, None).fetch_page(30).await;

    assert_eq!(
        outcome,
        FetchOutcome::ChallengeFallbackFailed(CHALLENGE_PAGE.to_owned())
    );
}

#[tokio::test]
async fn failed_reload_is_unresolved_challenge() {
    let driver = FakeDriver::new(Step::Page(CHALLENGE_PAGE), Step::Fail);
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, None).fetch_page(40).await;

    assert!(
        matches!(
            outcome,
            FetchOutcome::Failure(FetchFailure::ChallengeUnresolved(_))
        ),
        "got: {outcome:?}"
    );
    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn hanging_navigation_times_out_and_closes() {
    let driver = FakeDriver::new(Step::Hang, Step::Fail);
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, None).fetch_page(50).await;

    assert!(
        matches!(outcome, FetchOutcome::Failure(FetchFailure::NavigationTimeout(_))),
        "got: {outcome:?}"
    );
    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn navigation_error_is_transport_failure() {
    let driver = FakeDriver::new(Step::Fail, Step::Fail);
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, None).fetch_page(60).await;

    assert!(
        matches!(outcome, FetchOutcome::Failure(FetchFailure::Transport(ref m)) if m.contains("CONNECTION_RESET")),
        "got: {outcome:?}"
    );
    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn launch_failure_is_transport_failure() {
    let mut driver = FakeDriver::new(Step::Page(NORMAL_PAGE), Step::Fail);
    driver.launch_fails = true;
    let calls = Arc::clone(&driver.calls);

    let outcome = strategy(driver, None).fetch_page(70).await;

    assert!(matches!(outcome, FetchOutcome::Failure(FetchFailure::Transport(_))));
    assert_eq!(calls.lock().unwrap().closes, 0);
}

#[tokio::test]
async fn each_fetch_uses_a_fresh_session() {
    let driver = FakeDriver::new(Step::Page(NORMAL_PAGE), Step::Fail);
    let calls = Arc::clone(&driver.calls);
    let mut strategy = strategy(driver, None);

    strategy.fetch(1).await;
    strategy.fetch(2).await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.launches.len(), 2);
    assert_eq!(calls.closes, 2);
}

#[tokio::test]
async fn slow_render_within_driver_slack_succeeds() {
    let mut driver = FakeDriver::new(
        Step::Slow(Duration::from_millis(150), NORMAL_PAGE),
        Step::Fail,
    );
    driver.slack = Duration::from_secs(2);

    let outcome = strategy(driver, None).fetch_page(80).await;

    assert_eq!(outcome, FetchOutcome::Success(NORMAL_PAGE.to_owned()));
}

#[tokio::test]
async fn render_beyond_slack_reports_navigation_timeout() {
    let mut driver = FakeDriver::new(Step::Hang, Step::Fail);
    driver.slack = Duration::from_millis(100);

    let started = std::time::Instant::now();
    let outcome = strategy(driver, None).fetch_page(90).await;

    assert_eq!(
        outcome,
        FetchOutcome::Failure(FetchFailure::NavigationTimeout(0))
    );
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn outcome_markup_accessors() {
    assert_eq!(
        FetchOutcome::ChallengeFallbackFailed("b".into()).into_markup(),
        Some("b".to_owned())
    );
    assert_eq!(
        FetchOutcome::Failure(FetchFailure::NavigationTimeout(30)).into_markup(),
        None
    );
}
