//! The rendering-session seam between the page auditor and the browser.
//!
//! The auditor depends only on [`RenderSession`]; the chromiumoxide-backed
//! implementation lives in [`crate::chrome`]. Tests substitute a scripted
//! fake.

use crate::error::Result;
use crate::record::ErrorEntry;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// How long to keep waiting after navigation before a phase proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Navigation complete and the network gone quiet.
    NetworkSettled,
    /// The DOM is parsed; resources may still be loading.
    DomReady,
}

/// One fixed simulated viewport for the responsive sweep.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub label: &'static str,
}

pub const VIEWPORTS: [Viewport; 3] = [
    Viewport { width: 375, height: 812, label: "375" },
    Viewport { width: 768, height: 1024, label: "768" },
    Viewport { width: 1440, height: 900, label: "1440" },
];

/// Desktop size the tab is restored to after the responsive sweep.
pub const DEFAULT_VIEWPORT: Viewport = Viewport { width: 1440, height: 900, label: "1440" };

/// Ordered (condition, timeout) attempts for the primary navigation:
/// strict first, one relaxed fallback.
pub const PRIMARY_NAV_ATTEMPTS: [(WaitCondition, Duration); 2] = [
    (WaitCondition::NetworkSettled, Duration::from_secs(30)),
    (WaitCondition::DomReady, Duration::from_secs(15)),
];

/// Single relaxed attempt used by the responsive sweep, the accessibility
/// phase, and any other re-navigation of an already-audited URL.
pub const RELAXED_NAV_ATTEMPTS: [(WaitCondition, Duration); 1] =
    [(WaitCondition::DomReady, Duration::from_secs(20))];

/// A live rendering session bound to one browser tab, reused serially for
/// the whole crawl.
///
/// The session owns the console/page-error listeners and the per-page
/// response accounting; the auditor drains them between phases.
#[allow(async_fn_in_trait)]
pub trait RenderSession {
    /// Navigate the tab and wait for `wait`, bounded by `timeout`.
    ///
    /// Returns the main-document HTTP status when one was observed, even if
    /// the wait condition itself was only met on a fallback attempt.
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<Option<u16>>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<Value>;

    /// Post-JavaScript HTML of the current document.
    async fn content(&mut self) -> Result<String>;

    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<()>;

    async fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// Clear response accounting and pending error entries before a page.
    fn reset_tracking(&mut self);

    /// Drain console/page-error entries accumulated since the last drain.
    fn take_errors(&mut self) -> Vec<ErrorEntry>;

    /// Distinct responses observed since the last reset: (url, bytes).
    /// Responses without a content-length header report 0 bytes.
    fn response_log(&self) -> Vec<(String, u64)>;
}
