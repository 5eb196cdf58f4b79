//! Same-origin link discovery from the currently rendered page.

use crate::rules::{is_internal, normalise_url, should_skip};
use crate::session::RenderSession;
use std::collections::HashSet;
use tracing::debug;

const COLLECT_LINKS_JS: &str =
    "() => Array.from(document.querySelectorAll('a[href]')).map(a => a.href)";

/// Extract every in-scope hyperlink target from the current page.
///
/// Fragments and query strings are stripped and the result deduplicated.
/// A rendering-engine error yields an empty list. Discovery failure never
/// aborts the crawl, it only stops expansion from this page.
pub async fn discover_links<S: RenderSession>(session: &mut S, base_url: &str) -> Vec<String> {
    let hrefs: Vec<String> = match session.evaluate(COLLECT_LINKS_JS).await {
        Ok(value) => serde_json::from_value(value).unwrap_or_default(),
        Err(e) => {
            debug!("link extraction failed: {e}");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for href in hrefs {
        if !is_internal(&href, base_url) {
            continue;
        }
        let clean = normalise_url(href.split(['#', '?']).next().unwrap_or(&href));
        if should_skip(&clean) {
            continue;
        }
        if seen.insert(clean.clone()) {
            links.push(clean);
        }
    }
    links
}
