//! Per-page audit: navigation, timing, SEO, images, errors, responsive
//! layout, accessibility and the optional live comparison.
//!
//! Everything after a successful navigation is best-effort: a failing
//! phase records what it can and never discards data gathered by earlier
//! phases.

use crate::axe::AccessibilityRunner;
use crate::error::{AuditError, Result};
use crate::record::{
    A11yEntry, AuditRecord, ErrorEntry, ImageAudit, IssueKind, LiveComparison, ResponsiveIssue,
    SeoSnapshot,
};
use crate::rules::{categorise_path, normalise_url, path_of, safe_filename};
use crate::session::{
    DEFAULT_VIEWPORT, PRIMARY_NAV_ATTEMPTS, RELAXED_NAV_ATTEMPTS, RenderSession, VIEWPORTS,
    Viewport, WaitCondition,
};
use scraper::{Html, Selector};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

const TTFB_JS: &str = r#"() => {
    const e = performance.getEntriesByType('navigation')[0];
    return e ? Math.round(e.responseStart - e.startTime) : null;
}"#;

/// Bounded layout-shift observation: 1500ms, then the observer is torn
/// down and the accumulated score resolved.
const CLS_JS: &str = r#"() => {
    return new Promise(resolve => {
        let cls = 0;
        const obs = new PerformanceObserver(list => {
            for (const entry of list.getEntries())
                if (!entry.hadRecentInput) cls += entry.value;
        });
        try { obs.observe({type: 'layout-shift', buffered: true}); } catch(e) {}
        setTimeout(() => { obs.disconnect(); resolve(cls); }, 1500);
    });
}"#;

/// An explicit empty alt attribute counts as present.
const IMAGE_AUDIT_JS: &str = r#"() => {
    const imgs = Array.from(document.querySelectorAll('img'));
    return {
        total:       imgs.length,
        missing_alt: imgs.filter(i => !i.getAttribute('alt') && i.getAttribute('alt') !== '').length,
        broken:      imgs.filter(i => !i.complete || i.naturalWidth === 0).length,
    };
}"#;

const HORIZONTAL_OVERFLOW_JS: &str =
    "() => document.documentElement.scrollWidth > window.innerWidth";

const FIXED_OVERFLOW_JS: &str = r#"() => {
    for (const el of document.querySelectorAll('*')) {
        if (window.getComputedStyle(el).position === 'fixed' &&
            el.getBoundingClientRect().width > window.innerWidth)
            return true;
    }
    return false;
}"#;

/// Try each (condition, timeout) attempt in order, returning the first
/// success.
pub(crate) async fn navigate_with_policy<S: RenderSession>(
    session: &mut S,
    url: &str,
    attempts: &[(WaitCondition, Duration)],
) -> Result<Option<u16>> {
    let mut last_error = None;
    for (wait, timeout) in attempts {
        match session.navigate(url, *wait, *timeout).await {
            Ok(status) => return Ok(status),
            Err(e) => {
                debug!("navigation attempt ({wait:?}) for {url} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| AuditError::Navigation("no navigation attempts configured".to_string())))
}

/// Audit one URL through the shared rendering session.
///
/// Always returns a record; a total navigation failure yields one with a
/// single navigation-error entry and null metrics.
pub async fn audit_page<S: RenderSession, A: AccessibilityRunner>(
    session: &mut S,
    axe: &A,
    url: &str,
    compare_base: Option<&str>,
    screenshot_dir: Option<&Path>,
) -> AuditRecord {
    let path = path_of(url);
    let category = categorise_path(&path);
    let mut record = AuditRecord::new(path, url.to_string(), category);

    session.reset_tracking();

    // Phase 1: navigation, strict condition with one relaxed fallback.
    let started = Instant::now();
    match navigate_with_policy(session, url, &PRIMARY_NAV_ATTEMPTS).await {
        Ok(status) => record.status_code = status,
        Err(e) => {
            record.errors.push(ErrorEntry::navigation(e.to_string()));
            return record;
        }
    }
    record.load_time_ms = Some(started.elapsed().as_millis() as u64);

    // Phase 2: network accounting from the session's response log.
    let responses = session.response_log();
    record.request_count = responses.len();
    record.total_bytes = responses.iter().map(|(_, bytes)| bytes).sum();

    // Phase 3: TTFB and CLS. Missing API support yields null, not an error.
    if let Ok(value) = session.evaluate(TTFB_JS).await {
        record.ttfb_ms = value.as_i64();
    }
    if let Ok(value) = session.evaluate(CLS_JS).await {
        record.performance_vitals.cls =
            value.as_f64().map(|cls| (cls * 10_000.0).round() / 10_000.0);
    }

    // Phase 4: SEO extraction from the post-JavaScript HTML.
    if let Ok(html) = session.content().await {
        record.seo = extract_seo(&html);
    }

    // Phase 5: image audit.
    if let Ok(value) = session.evaluate(IMAGE_AUDIT_JS).await
        && let Ok(images) = serde_json::from_value::<ImageAudit>(value)
    {
        record.images = images;
    }

    // Phase 6: console/page errors accumulated since navigation.
    record.errors.extend(session.take_errors());

    // Phase 7: responsive sweep across the fixed viewports.
    for viewport in &VIEWPORTS {
        probe_viewport(session, url, viewport, screenshot_dir, &mut record).await;
    }
    if let Err(e) = session
        .set_viewport(DEFAULT_VIEWPORT.width, DEFAULT_VIEWPORT.height)
        .await
    {
        debug!("viewport reset failed for {url}: {e}");
    }

    // Phase 8: accessibility, one error entry on any failure.
    record.accessibility = match navigate_with_policy(session, url, &RELAXED_NAV_ATTEMPTS).await {
        Ok(_) => match axe.run(session).await {
            Ok(violations) => violations.into_iter().map(A11yEntry::Violation).collect(),
            Err(e) => vec![A11yEntry::engine_error(e.to_string())],
        },
        Err(e) => vec![A11yEntry::engine_error(e.to_string())],
    };

    // Phase 9: live comparison against a second deployment.
    if let Some(compare_base) = compare_base {
        record.live_comparison =
            Some(compare_live(session, compare_base, &record.url, record.load_time_ms).await);
    }

    record
}

/// Resize, re-navigate relaxed, evaluate the two layout predicates, and
/// attach a screenshot when anything triggered. A failed re-navigation
/// skips this viewport without recording anything.
async fn probe_viewport<S: RenderSession>(
    session: &mut S,
    url: &str,
    viewport: &Viewport,
    screenshot_dir: Option<&Path>,
    record: &mut AuditRecord,
) {
    if session
        .set_viewport(viewport.width, viewport.height)
        .await
        .is_err()
    {
        return;
    }
    if navigate_with_policy(session, url, &RELAXED_NAV_ATTEMPTS)
        .await
        .is_err()
    {
        return;
    }

    let overflow = session.evaluate(HORIZONTAL_OVERFLOW_JS).await;
    let fixed_overflow = session.evaluate(FIXED_OVERFLOW_JS).await;
    let (Ok(overflow), Ok(fixed_overflow)) = (overflow, fixed_overflow) else {
        return;
    };

    let mut issues = Vec::new();
    if overflow.as_bool().unwrap_or(false) {
        issues.push(IssueKind::HorizontalOverflow);
    }
    if fixed_overflow.as_bool().unwrap_or(false) {
        issues.push(IssueKind::FixedElementOverflow);
    }
    if issues.is_empty() {
        return;
    }

    let screenshot = capture_screenshot(session, screenshot_dir, &record.url, viewport).await;
    for issue in issues {
        record.responsive_issues.push(ResponsiveIssue {
            viewport: viewport.label.to_string(),
            issue,
            screenshot: screenshot.clone(),
        });
    }
}

/// Capture failure is tolerated: the issue is still recorded with a null
/// screenshot reference.
async fn capture_screenshot<S: RenderSession>(
    session: &mut S,
    screenshot_dir: Option<&Path>,
    page_path: &str,
    viewport: &Viewport,
) -> Option<String> {
    let dir = screenshot_dir?;
    if std::fs::create_dir_all(dir).is_err() {
        return None;
    }
    let filename = format!("{}_{}.png", safe_filename(page_path), viewport.label);
    match session.screenshot(&dir.join(&filename)).await {
        Ok(()) => Some(format!("screenshots/{filename}")),
        Err(e) => {
            debug!("screenshot capture failed for {page_path} at {}: {e}", viewport.label);
            None
        }
    }
}

async fn compare_live<S: RenderSession>(
    session: &mut S,
    compare_base: &str,
    page_path: &str,
    primary_load_ms: Option<u64>,
) -> LiveComparison {
    let live_url = format!("{}{}", normalise_url(compare_base), page_path);
    let started = Instant::now();
    match session
        .navigate(&live_url, WaitCondition::NetworkSettled, Duration::from_secs(30))
        .await
    {
        Ok(_) => {
            let live_ms = started.elapsed().as_millis() as u64;
            LiveComparison::Timing {
                live_url,
                live_load_time_ms: live_ms,
                delta_ms: live_ms as i64 - primary_load_ms.unwrap_or(0) as i64,
            }
        }
        Err(e) => LiveComparison::Error { error: e.to_string() },
    }
}

/// Parse the rendered HTML for the SEO snapshot. Malformed structured-data
/// blocks are skipped individually.
fn extract_seo(html: &str) -> SeoSnapshot {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let description_selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
    let canonical_selector = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
    let robots_selector = Selector::parse(r#"meta[name="robots"]"#).unwrap();
    let h1_selector = Selector::parse("h1").unwrap();
    let h2_selector = Selector::parse("h2").unwrap();
    let og_selector = Selector::parse(r#"meta[property^="og:"]"#).unwrap();
    let ld_json_selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();

    let mut seo = SeoSnapshot::default();

    seo.title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string());
    seo.meta_description = document
        .select(&description_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(String::from);
    seo.canonical = document
        .select(&canonical_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(String::from);
    seo.robots = document
        .select(&robots_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(String::from);

    seo.h1 = document
        .select(&h1_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();
    seo.h2 = document
        .select(&h2_selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .take(5)
        .collect();

    for element in document.select(&og_selector) {
        if let Some(property) = element.value().attr("property") {
            let content = element.value().attr("content").unwrap_or("");
            seo.og.insert(property.to_string(), content.to_string());
        }
    }

    for element in document.select(&ld_json_selector) {
        let raw = element.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
            seo.structured_data.push(value);
        }
    }

    seo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::A11yViolation;
    use crate::testing::{FakeAxe, FakeSession, NavOutcome};
    use serde_json::json;

    const PAGE_HTML: &str = r#"<html><head>
        <title> Welcome </title>
        <meta name="description" content="A fine site">
        <meta name="robots" content="index, follow">
        <link rel="canonical" href="https://example.test/about">
        <meta property="og:title" content="Welcome">
        <meta property="og:type" content="website">
        <script type="application/ld+json">{"@type": "WebPage"}</script>
        <script type="application/ld+json">not json at all</script>
    </head><body>
        <h1>Main heading</h1>
        <h2>One</h2><h2>Two</h2><h2>Three</h2><h2>Four</h2><h2>Five</h2><h2>Six</h2>
    </body></html>"#;

    fn full_session() -> FakeSession {
        FakeSession::ok()
            .with_html(PAGE_HTML)
            .with_eval("responseStart", json!(110))
            .with_eval("layout-shift", json!(0.03456789))
            .with_eval("querySelectorAll('img')", json!({"total": 2, "missing_alt": 1, "broken": 1}))
            .with_eval("scrollWidth", json!(false))
            .with_eval("position === 'fixed'", json!(false))
    }

    #[tokio::test]
    async fn happy_path_fills_every_phase() {
        let mut session = full_session();
        session.responses = vec![
            ("https://example.test/about".to_string(), 1024),
            ("https://example.test/app.css".to_string(), 0),
        ];
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/about",
            None,
            None,
        )
        .await;

        assert_eq!(record.url, "/about");
        assert_eq!(record.category, "about");
        assert_eq!(record.status_code, Some(200));
        assert!(record.load_time_ms.is_some());
        assert_eq!(record.ttfb_ms, Some(110));
        assert_eq!(record.request_count, 2);
        assert_eq!(record.total_bytes, 1024);
        assert_eq!(record.performance_vitals.cls, Some(0.0346));

        assert_eq!(record.seo.title.as_deref(), Some("Welcome"));
        assert_eq!(record.seo.meta_description.as_deref(), Some("A fine site"));
        assert_eq!(record.seo.canonical.as_deref(), Some("https://example.test/about"));
        assert_eq!(record.seo.robots.as_deref(), Some("index, follow"));
        assert_eq!(record.seo.h1, vec!["Main heading"]);
        assert_eq!(record.seo.h2.len(), 5, "h2 list is capped at five");
        assert_eq!(record.seo.og.get("og:type").map(String::as_str), Some("website"));
        assert_eq!(record.seo.structured_data.len(), 1, "malformed ld+json dropped");

        assert_eq!(record.images, ImageAudit { total: 2, missing_alt: 1, broken: 1 });
        assert!(record.responsive_issues.is_empty());
        assert!(record.accessibility.is_empty());
        assert!(record.live_comparison.is_none());
    }

    #[tokio::test]
    async fn navigation_failure_short_circuits() {
        let mut session = FakeSession::ok().with_nav_outcomes(vec![
            NavOutcome::Fail("strict timeout".to_string()),
            NavOutcome::Fail("relaxed timeout".to_string()),
        ]);
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/slow",
            None,
            None,
        )
        .await;

        assert_eq!(record.status_code, None);
        assert_eq!(record.load_time_ms, None);
        assert_eq!(record.errors.len(), 1);
        assert_eq!(record.errors[0].kind, "navigation_error");
        // Only the two primary attempts ran, no later phases navigated.
        assert_eq!(session.navigations.len(), 2);
        assert!(session.viewports.is_empty());
    }

    #[tokio::test]
    async fn relaxed_fallback_still_yields_status_and_timing() {
        let mut session = full_session().with_nav_outcomes(vec![
            NavOutcome::Fail("strict timeout".to_string()),
            NavOutcome::Ok(Some(200)),
        ]);
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/",
            None,
            None,
        )
        .await;

        assert_eq!(record.status_code, Some(200));
        assert!(record.load_time_ms.is_some());
        assert_eq!(session.navigations[0].1, WaitCondition::NetworkSettled);
        assert_eq!(session.navigations[1].1, WaitCondition::DomReady);
    }

    #[tokio::test]
    async fn missing_axe_engine_yields_single_error_entry() {
        let mut session = full_session();
        let record = audit_page(
            &mut session,
            &FakeAxe::unavailable("axe global not available after 10s"),
            "https://example.test/about",
            None,
            None,
        )
        .await;

        assert_eq!(record.accessibility.len(), 1);
        assert!(matches!(
            &record.accessibility[0],
            A11yEntry::Error(entry) if entry.kind == "axe_error"
        ));
        // Earlier phases are unaffected.
        assert_eq!(record.seo.title.as_deref(), Some("Welcome"));
        assert_eq!(record.images.total, 2);
        assert!(record.load_time_ms.is_some());
    }

    #[tokio::test]
    async fn axe_violations_map_to_entries() {
        let mut session = full_session();
        let record = audit_page(
            &mut session,
            &FakeAxe::violations(vec![A11yViolation {
                id: "image-alt".to_string(),
                impact: Some("critical".to_string()),
                description: "Images must have alternate text".to_string(),
                nodes: 2,
            }]),
            "https://example.test/about",
            None,
            None,
        )
        .await;

        assert_eq!(record.a11y_violation_count(), 1);
    }

    #[tokio::test]
    async fn responsive_issues_recorded_per_viewport() {
        let mut session = full_session();
        // Overwrite the overflow answers: every viewport overflows both ways.
        session.eval_responses.retain(|(needle, _)| {
            *needle != "scrollWidth" && *needle != "position === 'fixed'"
        });
        session.eval_responses.push(("scrollWidth", json!(true)));
        session.eval_responses.push(("position === 'fixed'", json!(true)));

        let dir = std::env::temp_dir().join("siteaudit-test-shots");
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/wide",
            None,
            Some(&dir),
        )
        .await;

        // 3 viewports x 2 predicates.
        assert_eq!(record.responsive_issues.len(), 6);
        let labels: Vec<&str> = record
            .responsive_issues
            .iter()
            .map(|i| i.viewport.as_str())
            .collect();
        assert!(labels.contains(&"375"));
        assert!(labels.contains(&"768"));
        assert!(labels.contains(&"1440"));
        assert_eq!(
            record.responsive_issues[0].screenshot.as_deref(),
            Some("screenshots/wide_375.png")
        );
        // One screenshot per triggered viewport, not per issue.
        assert_eq!(session.screenshots.len(), 3);
        // Viewport restored to the desktop default at the end of the sweep.
        assert_eq!(session.viewports.last(), Some(&(1440, 900)));
    }

    #[tokio::test]
    async fn screenshot_failure_keeps_the_issue() {
        let mut session = full_session();
        session.eval_responses.retain(|(needle, _)| *needle != "scrollWidth");
        session.eval_responses.push(("scrollWidth", json!(true)));
        session.screenshot_fails = true;

        let dir = std::env::temp_dir().join("siteaudit-test-shots");
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/wide",
            None,
            Some(&dir),
        )
        .await;

        assert_eq!(record.responsive_issues.len(), 3);
        assert!(record.responsive_issues.iter().all(|i| i.screenshot.is_none()));
    }

    #[tokio::test]
    async fn failed_viewport_navigation_skips_that_viewport() {
        let mut session = full_session();
        session.eval_responses.retain(|(needle, _)| *needle != "scrollWidth");
        session.eval_responses.push(("scrollWidth", json!(true)));
        // Primary nav ok, then the first viewport's relaxed nav fails.
        session.nav_queue = vec![
            NavOutcome::Ok(Some(200)),
            NavOutcome::Fail("mobile render crashed".to_string()),
        ]
        .into();

        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/wide",
            None,
            None,
        )
        .await;

        // 375 skipped, 768 and 1440 still probed.
        let labels: Vec<&str> = record
            .responsive_issues
            .iter()
            .map(|i| i.viewport.as_str())
            .collect();
        assert!(!labels.contains(&"375"));
        assert!(labels.contains(&"768"));
        assert!(labels.contains(&"1440"));
    }

    #[tokio::test]
    async fn unreachable_comparison_host_becomes_error_object() {
        let mut session = full_session();
        // Primary nav + 3 viewport navs + a11y nav succeed, comparison fails.
        session.nav_queue = vec![
            NavOutcome::Ok(Some(200)),
            NavOutcome::Ok(Some(200)),
            NavOutcome::Ok(Some(200)),
            NavOutcome::Ok(Some(200)),
            NavOutcome::Ok(Some(200)),
            NavOutcome::Fail("net::ERR_NAME_NOT_RESOLVED".to_string()),
        ]
        .into();

        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/about",
            Some("https://live.example.test/"),
            None,
        )
        .await;

        assert_eq!(record.status_code, Some(200));
        assert!(matches!(
            record.live_comparison,
            Some(LiveComparison::Error { .. })
        ));
        // The comparison navigated to the equivalent live path.
        let last_nav = session.navigations.last().unwrap();
        assert_eq!(last_nav.0, "https://live.example.test/about");
    }

    #[tokio::test]
    async fn successful_comparison_reports_delta() {
        let mut session = full_session();
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/about",
            Some("https://live.example.test"),
            None,
        )
        .await;

        match record.live_comparison {
            Some(LiveComparison::Timing { ref live_url, .. }) => {
                assert_eq!(live_url, "https://live.example.test/about");
            }
            other => panic!("expected timing comparison, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn console_errors_survive_later_phases() {
        let mut session = full_session();
        session.pending_errors = vec![
            ErrorEntry::new("error", "Uncaught TypeError: x is undefined"),
            ErrorEntry::new("warning", "Mixed content"),
        ];
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/",
            None,
            None,
        )
        .await;

        assert_eq!(record.errors.len(), 2);
        assert_eq!(record.errors[0].kind, "error");
    }

    #[tokio::test]
    async fn evaluation_failures_leave_metrics_null() {
        let mut session = FakeSession::ok().with_html(PAGE_HTML);
        session.eval_fails = true;
        let record = audit_page(
            &mut session,
            &FakeAxe::clean(),
            "https://example.test/about",
            None,
            None,
        )
        .await;

        // Navigation succeeded, so the record completes with null metrics
        // rather than short-circuiting.
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.ttfb_ms, None);
        assert_eq!(record.performance_vitals.cls, None);
        assert_eq!(record.images, ImageAudit::default());
        assert!(record.responsive_issues.is_empty());
        // The SEO phase reads the document content, not a script value.
        assert_eq!(record.seo.title.as_deref(), Some("Welcome"));
    }

    #[test]
    fn seo_extraction_handles_empty_document() {
        let seo = extract_seo("<html><head></head><body></body></html>");
        assert_eq!(seo.title, None);
        assert!(seo.h1.is_empty());
        assert!(seo.og.is_empty());
        assert!(seo.structured_data.is_empty());
    }
}
