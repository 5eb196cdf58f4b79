use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use siteaudit_auditor::{AuditRecord, AxeRunner, ChromeSession, Crawler, ProgressCallback};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use crate::seed::seed_urls_from_drush;

/// Options for configuring an audit run
pub struct AuditOptions {
    pub base_url: String,
    /// Second deployment of the same site to compare load times against
    pub compare_base: Option<String>,
    /// Drush launcher used to seed the frontier from the Drupal database
    pub drush_cmd: Option<String>,
    pub screenshot_dir: PathBuf,
    pub show_progress: bool,
}

/// Execute a full site audit with the given options
/// Returns one record per visited page
pub async fn execute_audit(options: AuditOptions) -> anyhow::Result<Vec<AuditRecord>> {
    let AuditOptions {
        base_url,
        compare_base,
        drush_cmd,
        screenshot_dir,
        show_progress,
    } = options;

    let seed_urls = match drush_cmd {
        Some(ref drush) => {
            info!("Seeding URLs from the Drupal database via drush");
            seed_urls_from_drush(drush, &base_url).await
        }
        None => Vec::new(),
    };

    let session = ChromeSession::launch()
        .await
        .context("failed to launch headless Chrome")?;

    // Set up single progress bar for overall audit progress (only if enabled)
    let progress_bar = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.set_message("Starting audit...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let audited_count = Arc::new(AtomicUsize::new(0));

    let progress_callback: ProgressCallback = if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let count_clone = audited_count.clone();
        Arc::new(move |_page_number: usize, path: String| {
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!("Auditing {path} ({count} pages so far)"));
            pb_clone.tick();
        })
    } else {
        Arc::new(|_page_number: usize, _path: String| {})
    };

    let mut crawler = Crawler::new(session, AxeRunner::new(), &base_url)
        .with_seed_urls(seed_urls)
        .with_screenshot_dir(screenshot_dir)
        .with_progress_callback(progress_callback);
    if let Some(ref compare) = compare_base {
        crawler = crawler.with_compare_base(compare);
    }

    let (records, session) = crawler.crawl().await;

    if let Err(e) = session.close().await {
        warn!("failed to close browser cleanly: {e}");
    }

    if let Some(ref pb) = progress_bar {
        let total = audited_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Audit complete! {total} pages audited"));
    }

    Ok(records)
}
