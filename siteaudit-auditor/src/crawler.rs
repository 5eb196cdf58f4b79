//! The crawl orchestrator: frontier queue, visited set, audit loop.

use crate::auditor::audit_page;
use crate::axe::AccessibilityRunner;
use crate::discover::discover_links;
use crate::record::AuditRecord;
use crate::rules::{normalise_url, path_of, should_skip};
use crate::session::RenderSession;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Reports (visited count, page path) as the loop proceeds.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Owns the single rendering session, the frontier and the result
/// collection for one run. Exactly one crawler exists per run.
pub struct Crawler<S, A> {
    session: S,
    axe: A,
    base_url: String,
    compare_base: Option<String>,
    seed_urls: Vec<String>,
    screenshot_dir: Option<PathBuf>,
    progress_callback: Option<ProgressCallback>,
}

impl<S: RenderSession, A: AccessibilityRunner> Crawler<S, A> {
    pub fn new(session: S, axe: A, base_url: &str) -> Self {
        Self {
            session,
            axe,
            base_url: normalise_url(base_url),
            compare_base: None,
            seed_urls: Vec::new(),
            screenshot_dir: None,
            progress_callback: None,
        }
    }

    pub fn with_compare_base(mut self, compare_base: &str) -> Self {
        self.compare_base = Some(normalise_url(compare_base));
        self
    }

    /// Externally contributed seed URLs, visited before any discovered
    /// link because they enter the frontier ahead of the loop.
    pub fn with_seed_urls(mut self, seed_urls: Vec<String>) -> Self {
        self.seed_urls = seed_urls;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: PathBuf) -> Self {
        self.screenshot_dir = Some(dir);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Run the crawl to completion and hand the session back for shutdown.
    ///
    /// Every popped URL is checked against the visited set and the skip
    /// rules before auditing; duplicates in the queue are filtered here,
    /// not at enqueue time. One AuditRecord is appended per visit.
    pub async fn crawl(mut self) -> (Vec<AuditRecord>, S) {
        let mut frontier: VecDeque<String> = VecDeque::new();
        frontier.push_back(format!("{}/", self.base_url));
        frontier.extend(self.seed_urls.drain(..));

        let mut visited: HashSet<String> = HashSet::new();
        let mut records: Vec<AuditRecord> = Vec::new();

        info!("Starting audit crawl of {}", self.base_url);

        while let Some(url) = frontier.pop_front() {
            let normalised = normalise_url(&url);
            if visited.contains(&normalised) || should_skip(&url) {
                continue;
            }
            visited.insert(normalised);

            info!("[{:>3}] {}", visited.len(), path_of(&url));
            if let Some(ref callback) = self.progress_callback {
                callback(visited.len(), path_of(&url));
            }

            let record = audit_page(
                &mut self.session,
                &self.axe,
                &url,
                self.compare_base.as_deref(),
                self.screenshot_dir.as_deref(),
            )
            .await;
            records.push(record);

            for link in discover_links(&mut self.session, &self.base_url).await {
                if !visited.contains(&normalise_url(&link)) {
                    frontier.push_back(link);
                }
            }
        }

        info!("Audit complete. Visited {} pages", records.len());
        (records, self.session)
    }
}
