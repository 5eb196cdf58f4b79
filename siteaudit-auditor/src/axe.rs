//! Accessibility audit via a runtime-injected axe-core engine.
//!
//! The page auditor depends only on [`AccessibilityRunner`]; the real
//! runner downloads the axe-core script once, injects it into the page,
//! polls for the global, and maps the violation list.

use crate::error::{AuditError, Result};
use crate::record::A11yViolation;
use crate::session::RenderSession;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

pub const AXE_CDN: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.8.3/axe.min.js";

/// Poll interval while waiting for `window.axe` to appear.
const READY_POLL: Duration = Duration::from_millis(250);
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

const AXE_RUN_JS: &str = r#"async () => {
    const r = await window.axe.run();
    return r.violations.map(v => ({
        id: v.id, impact: v.impact,
        description: v.description, nodes: v.nodes.length,
    }));
}"#;

/// Capability interface for running the accessibility rules engine against
/// the session's current page.
#[allow(async_fn_in_trait)]
pub trait AccessibilityRunner {
    async fn run<S: RenderSession>(&self, session: &mut S) -> Result<Vec<A11yViolation>>;
}

/// Downloads and injects axe-core, then runs it in-page.
pub struct AxeRunner {
    client: reqwest::Client,
    source_url: String,
    source: OnceCell<String>,
    ready_timeout: Duration,
}

impl AxeRunner {
    pub fn new() -> Self {
        Self::with_source_url(AXE_CDN)
    }

    pub fn with_source_url(source_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            source_url: source_url.to_string(),
            source: OnceCell::new(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    /// The engine script, fetched once per run and cached.
    async fn source(&self) -> Result<&str> {
        let source = self
            .source
            .get_or_try_init(|| async {
                let body = self
                    .client
                    .get(&self.source_url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                Ok::<String, AuditError>(body)
            })
            .await?;
        Ok(source.as_str())
    }
}

impl Default for AxeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessibilityRunner for AxeRunner {
    async fn run<S: RenderSession>(&self, session: &mut S) -> Result<Vec<A11yViolation>> {
        let source = self.source().await?;
        session.evaluate(source).await?;

        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let ready = session
                .evaluate("typeof window.axe !== 'undefined'")
                .await?
                .as_bool()
                .unwrap_or(false);
            if ready {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AuditError::Accessibility(format!(
                    "axe global not available after {:?}",
                    self.ready_timeout
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }

        let value = session.evaluate(AXE_RUN_JS).await?;
        serde_json::from_value(value)
            .map_err(|e| AuditError::Accessibility(format!("unexpected axe output: {e}")))
    }
}
