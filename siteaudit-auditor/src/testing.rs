//! Scripted fakes standing in for a live browser in unit tests.

use crate::axe::AccessibilityRunner;
use crate::error::{AuditError, Result};
use crate::record::{A11yViolation, ErrorEntry};
use crate::session::{RenderSession, WaitCondition};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum NavOutcome {
    Ok(Option<u16>),
    Fail(String),
}

/// A deterministic [`RenderSession`] driven by canned values.
///
/// `evaluate` answers with the value of the first registered script
/// fragment found in the expression; everything else yields `null`.
/// Navigation outcomes are consumed from a queue, falling back to a
/// default outcome once the queue is empty.
pub(crate) struct FakeSession {
    pub nav_queue: VecDeque<NavOutcome>,
    pub default_nav: NavOutcome,
    pub eval_responses: Vec<(&'static str, Value)>,
    pub eval_fails: bool,
    pub html: String,
    pub pending_errors: Vec<ErrorEntry>,
    pub responses: Vec<(String, u64)>,
    pub screenshot_fails: bool,
    /// Call log, newest last.
    pub navigations: Vec<(String, WaitCondition, Duration)>,
    pub viewports: Vec<(u32, u32)>,
    pub screenshots: Vec<PathBuf>,
    pub resets: usize,
}

impl FakeSession {
    pub fn ok() -> Self {
        Self {
            nav_queue: VecDeque::new(),
            default_nav: NavOutcome::Ok(Some(200)),
            eval_responses: Vec::new(),
            eval_fails: false,
            html: "<html><head><title>Fake</title></head><body></body></html>".to_string(),
            pending_errors: Vec::new(),
            responses: Vec::new(),
            screenshot_fails: false,
            navigations: Vec::new(),
            viewports: Vec::new(),
            screenshots: Vec::new(),
            resets: 0,
        }
    }

    pub fn with_eval(mut self, needle: &'static str, value: Value) -> Self {
        self.eval_responses.push((needle, value));
        self
    }

    pub fn with_nav_outcomes(mut self, outcomes: Vec<NavOutcome>) -> Self {
        self.nav_queue = outcomes.into();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }
}

impl RenderSession for FakeSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<Option<u16>> {
        self.navigations.push((url.to_string(), wait, timeout));
        let outcome = self
            .nav_queue
            .pop_front()
            .unwrap_or_else(|| self.default_nav.clone());
        match outcome {
            NavOutcome::Ok(status) => Ok(status),
            NavOutcome::Fail(message) => Err(AuditError::Navigation(message)),
        }
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        if self.eval_fails {
            return Err(AuditError::Evaluation("evaluation crashed".to_string()));
        }
        for (needle, value) in &self.eval_responses {
            if expression.contains(needle) {
                return Ok(value.clone());
            }
        }
        Ok(Value::Null)
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        self.viewports.push((width, height));
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        if self.screenshot_fails {
            return Err(AuditError::Evaluation("screenshot failed".to_string()));
        }
        self.screenshots.push(path.to_path_buf());
        Ok(())
    }

    fn reset_tracking(&mut self) {
        self.resets += 1;
    }

    fn take_errors(&mut self) -> Vec<ErrorEntry> {
        std::mem::take(&mut self.pending_errors)
    }

    fn response_log(&self) -> Vec<(String, u64)> {
        self.responses.clone()
    }
}

/// An [`AccessibilityRunner`] with a fixed outcome.
pub(crate) struct FakeAxe {
    pub outcome: std::result::Result<Vec<A11yViolation>, String>,
}

impl FakeAxe {
    pub fn clean() -> Self {
        Self { outcome: Ok(Vec::new()) }
    }

    pub fn violations(violations: Vec<A11yViolation>) -> Self {
        Self { outcome: Ok(violations) }
    }

    pub fn unavailable(message: &str) -> Self {
        Self { outcome: Err(message.to_string()) }
    }
}

impl AccessibilityRunner for FakeAxe {
    async fn run<S: RenderSession>(&self, _session: &mut S) -> Result<Vec<A11yViolation>> {
        self.outcome
            .clone()
            .map_err(AuditError::Accessibility)
    }
}
