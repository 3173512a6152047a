//! Retry, stability, and failure-capture behaviour of `BasePage`
//!
//! Runs against the scripted engine with tokio's clock paused, so elapsed
//! times are exact.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use storefront_e2e::engine::Tick;
use storefront_e2e::{
    ActionConfig, BasePage, BoundingRect, DiagnosticEvent, Diagnostics, Error, ErrorKind,
    FailureArtifact, MemoryDiagnostics, RetryBudget, ScriptedEngine, StabilityConfig,
};

const A: BoundingRect = BoundingRect {
    x: 100.0,
    y: 400.0,
    width: 160.0,
    height: 40.0,
};

fn at_x(x: f64) -> BoundingRect {
    BoundingRect { x, ..A }
}

fn config(dir: &Path) -> ActionConfig {
    ActionConfig {
        timeout: Duration::from_secs(5),
        retry: RetryBudget::new(3, Duration::from_millis(100)),
        stability: StabilityConfig::default(),
        screenshot_dir: dir.to_path_buf(),
    }
}

fn page_with(
    engine: ScriptedEngine,
    config: ActionConfig,
) -> (BasePage<ScriptedEngine>, Arc<MemoryDiagnostics>) {
    let diag = Arc::new(MemoryDiagnostics::new());
    (BasePage::with_diagnostics(engine, config, diag.clone()), diag)
}

fn pngs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .filter(|name| name.ends_with(".png"))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn test_late_button_is_clicked_after_retries_and_settling() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        ScriptedEngine::new().element("#submit", [Tick::Hidden, Tick::Hidden, Tick::Visible(A)]);
    let (page, diag) = page_with(engine, config(dir.path()));

    let start = Instant::now();
    assert_ok!(page.click("#submit", None).await);

    // two retry pauses, then three stability samples
    assert_eq!(start.elapsed(), Duration::from_millis(200 + 300));
    assert_eq!(page.engine().visibility_checks("#submit"), 3);
    assert_eq!(page.engine().rect_samples("#submit"), 3);
    assert_eq!(page.engine().clicks(), vec!["#submit".to_string()]);
    assert!(pngs(dir.path()).is_empty());

    let retries = diag
        .events()
        .into_iter()
        .filter(|e| matches!(e, DiagnosticEvent::LocateRetry { .. }))
        .count();
    assert_eq!(retries, 2);
}

#[tokio::test(start_paused = true)]
async fn test_larger_budget_stops_at_first_success() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        ScriptedEngine::new().element("#submit", [Tick::Hidden, Tick::Hidden, Tick::Visible(A)]);
    let config = ActionConfig {
        retry: RetryBudget::new(5, Duration::from_millis(100)),
        ..config(dir.path())
    };
    let (page, _) = page_with(engine, config);

    let start = Instant::now();
    assert_ok!(page.click("#submit", None).await);

    assert_eq!(start.elapsed(), Duration::from_millis(200 + 300));
    assert_eq!(page.engine().visibility_checks("#submit"), 3);
    assert_eq!(page.engine().clicks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_moving_element_is_clicked_once_it_settles() {
    let dir = tempfile::tempdir().unwrap();
    // located at A, then slides through two positions before settling
    let engine = ScriptedEngine::new().element(
        "#banner-close",
        [
            Tick::Visible(A),
            Tick::Visible(at_x(140.0)),
            Tick::Visible(at_x(180.0)),
            Tick::Visible(at_x(200.0)),
        ],
    );
    let (page, _) = page_with(engine, config(dir.path()));

    let start = Instant::now();
    assert_ok!(page.click("#banner-close", None).await);

    assert_eq!(page.engine().rect_samples("#banner-close"), 5);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_detached_sample_resets_stability() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().element(
        "#add-to-cart",
        [
            Tick::Visible(A),
            Tick::Visible(A),
            Tick::Visible(A),
            Tick::Detached,
            Tick::Visible(A),
        ],
    );
    let (page, diag) = page_with(engine, config(dir.path()));

    assert_ok!(page.click("#add-to-cart", None).await);

    // two good samples, one lost, then three fresh ones
    assert_eq!(page.engine().rect_samples("#add-to-cart"), 6);
    assert!(diag.events().iter().any(|e| matches!(
        e,
        DiagnosticEvent::StabilityReset { stable_count: 2, .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_check_exactly_n_times() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().element("#never", [Tick::Hidden]);
    let config = ActionConfig {
        retry: RetryBudget::new(4, Duration::from_millis(250)),
        ..config(dir.path())
    };
    let (page, diag) = page_with(engine, config);

    let start = Instant::now();
    let err = assert_err!(page.click("#never", None).await);

    assert_eq!(err.kind(), ErrorKind::LocateTimeout);
    assert!(matches!(err, Error::LocateTimeout { attempts: 4, .. }));
    assert_eq!(page.engine().visibility_checks("#never"), 4);
    assert_eq!(start.elapsed(), Duration::from_millis(750));

    let files = pngs(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("element_not_found_"));
    assert_eq!(diag.artifacts().len(), 1);
    assert_eq!(diag.artifacts()[0].selector.as_deref(), Some("#never"));
}

#[tokio::test(start_paused = true)]
async fn test_visibility_check_reports_now_while_action_waits() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().element("#cart-count", [Tick::Hidden, Tick::Visible(A)]);
    let (page, _) = page_with(engine, config(dir.path()));

    let start = Instant::now();
    assert!(!page.is_visible("#cart-count", None).await);
    assert!(!page.is_visible("#no-such-thing", None).await);
    assert!(!page.is_visible("#cart-count", Some(Duration::ZERO)).await);
    assert!(!page.is_visible("#cart-count", Some(Duration::from_secs(60))).await);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(page.engine().visibility_checks("#cart-count"), 0);

    assert_ok!(page.wait_for_visible("#cart-count", None).await);
    assert!(page.is_visible("#cart-count", None).await);
    assert!(pngs(dir.path()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_click_failure_keeps_engine_message() {
    let dir = tempfile::tempdir().unwrap();
    let message = "Element is not clickable at point (180, 420)";
    let engine = ScriptedEngine::new()
        .visible("#checkout", A)
        .fail_click("#checkout", message);
    let (page, diag) = page_with(engine, config(dir.path()));

    let err = assert_err!(page.click("#checkout", None).await);

    assert_eq!(err.kind(), ErrorKind::ActionFailure);
    assert!(err.to_string().contains(message));
    let files = pngs(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("click_error_"));

    let artifacts = diag.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].selector.as_deref(), Some("#checkout"));
    assert!(artifacts[0].screenshot_path.exists());
    assert!(diag.events().iter().any(|e| matches!(
        e,
        DiagnosticEvent::ActionFailed { operation, error, .. }
            if operation == "click" && error.contains(message)
    )));
}

#[tokio::test(start_paused = true)]
async fn test_stability_timeout_uses_action_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let ticks: Vec<Tick> = (0..200).map(|i| Tick::Visible(at_x(i as f64 * 3.0))).collect();
    let engine = ScriptedEngine::new().element("#carousel-next", ticks);
    let (page, _) = page_with(engine, config(dir.path()));

    let start = Instant::now();
    let err = assert_err!(
        page.click("#carousel-next", Some(Duration::from_secs(1)))
            .await
    );

    assert_eq!(err.kind(), ErrorKind::StabilityTimeout);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert!(page.engine().clicks().is_empty());
    let files = pngs(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("click_error_"));
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_directory_is_created_on_demand() {
    let dir = tempfile::tempdir().unwrap();
    let shots = dir.path().join("output").join("screenshots");
    let engine = ScriptedEngine::new()
        .visible("#go", A)
        .fail_click("#go", "detached")
        .visible("#q", A)
        .fail_fill("#q", "read-only");
    let (page, _) = page_with(engine, config(&shots));

    assert_err!(page.click("#go", None).await);
    assert_err!(page.type_text("#q", "shoes", None).await);

    let files = pngs(&shots);
    assert_eq!(files.len(), 2);
    assert!(files[0].starts_with("click_error_"));
    assert!(files[1].starts_with("type_text_error_"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_screenshot_does_not_mask_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new()
        .visible("#go", A)
        .fail_click("#go", "node detached")
        .fail_screenshot("target crashed");
    let (page, diag) = page_with(engine, config(dir.path()));

    let err = assert_err!(page.click("#go", None).await);

    assert!(err.to_string().contains("node detached"));
    assert!(pngs(dir.path()).is_empty());
    assert!(diag.artifacts().is_empty());
    assert!(diag.events().iter().any(|e| matches!(
        e,
        DiagnosticEvent::CaptureFailed { error, .. } if error.contains("target crashed")
    )));
}

#[tokio::test(start_paused = true)]
async fn test_report_lists_failures() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().element("#gone", [Tick::Hidden]);
    let (page, diag) = page_with(engine, config(&dir.path().join("shots")));

    assert_err!(page.get_text("#gone", None).await);

    let report = dir.path().join("reports").join("run.json");
    assert_ok!(diag.write_report(&report));
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();

    let artifacts = json["artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0]["selector"], "#gone");
    let png = base64::engine::general_purpose::STANDARD
        .decode(artifacts[0]["png_base64"].as_str().unwrap())
        .unwrap();
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    let events = json["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["event"] == "locate_exhausted"));
    assert!(events
        .iter()
        .any(|e| e["event"] == "action_failed" && e["operation"] == "get_text"));
}

#[derive(Default)]
struct Counting {
    events: AtomicUsize,
    artifacts: AtomicUsize,
}

impl Diagnostics for Counting {
    fn record(&self, _event: DiagnosticEvent) {
        self.events.fetch_add(1, Ordering::SeqCst);
    }

    fn attach(&self, _artifact: &FailureArtifact) {
        self.artifacts.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_diagnostics_sink() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(Counting::default());
    let engine = ScriptedEngine::new().element("#late", [Tick::Hidden]);
    let page = BasePage::with_diagnostics(engine, config(dir.path()), sink.clone());

    assert_err!(page.wait_for_visible("#late", None).await);

    assert_eq!(sink.artifacts.load(Ordering::SeqCst), 1);
    // 3 attempts, 2 retries, exhausted, artifact saved, action failed
    assert_eq!(sink.events.load(Ordering::SeqCst), 8);
}
