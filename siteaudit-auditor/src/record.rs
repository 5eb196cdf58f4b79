//! Report data model for one audited page.
//!
//! Field names mirror the emitted JSON exactly, so a written report can be
//! re-parsed into an equal record collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The complete structured report for one audited URL.
///
/// Created empty at the start of an audit, filled in phase by phase, and
/// treated as immutable once appended to the run's result collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Path component only, e.g. `/about`.
    pub url: String,
    pub full_url: String,
    /// First path segment, or "homepage" for the root.
    pub category: String,
    /// None when navigation failed before any response.
    pub status_code: Option<u16>,
    pub load_time_ms: Option<u64>,
    pub ttfb_ms: Option<i64>,
    pub request_count: usize,
    pub total_bytes: u64,
    pub seo: SeoSnapshot,
    pub images: ImageAudit,
    pub errors: Vec<ErrorEntry>,
    pub responsive_issues: Vec<ResponsiveIssue>,
    pub accessibility: Vec<A11yEntry>,
    pub performance_vitals: PerformanceVitals,
    pub live_comparison: Option<LiveComparison>,
}

impl AuditRecord {
    pub fn new(url: String, full_url: String, category: String) -> Self {
        Self {
            url,
            full_url,
            category,
            status_code: None,
            load_time_ms: None,
            ttfb_ms: None,
            request_count: 0,
            total_bytes: 0,
            seo: SeoSnapshot::default(),
            images: ImageAudit::default(),
            errors: Vec::new(),
            responsive_issues: Vec::new(),
            accessibility: Vec::new(),
            performance_vitals: PerformanceVitals::default(),
            live_comparison: None,
        }
    }

    /// Violations only; an error-tagged accessibility entry does not count.
    pub fn a11y_violation_count(&self) -> usize {
        self.accessibility
            .iter()
            .filter(|entry| matches!(entry, A11yEntry::Violation(_)))
            .count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoSnapshot {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub robots: Option<String>,
    pub h1: Vec<String>,
    /// First five second-level headings only.
    pub h2: Vec<String>,
    pub og: BTreeMap<String, String>,
    /// Parsed ld+json blocks; malformed blocks are dropped, not recorded.
    pub structured_data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAudit {
    pub total: usize,
    pub missing_alt: usize,
    pub broken: usize,
}

/// One tagged error entry: console/page errors and navigation failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ErrorEntry {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn navigation(message: impl Into<String>) -> Self {
        Self::new("navigation_error", message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    HorizontalOverflow,
    FixedElementOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsiveIssue {
    /// Viewport width label, e.g. "375".
    pub viewport: String,
    pub issue: IssueKind,
    /// Relative screenshot path; None when capture failed.
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct A11yViolation {
    pub id: String,
    pub impact: Option<String>,
    pub description: String,
    /// Count of affected DOM nodes.
    pub nodes: usize,
}

/// Either a rule violation summary or a single engine-failure entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum A11yEntry {
    Violation(A11yViolation),
    Error(ErrorEntry),
}

impl A11yEntry {
    pub fn engine_error(message: impl Into<String>) -> Self {
        A11yEntry::Error(ErrorEntry::new("axe_error", message))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceVitals {
    /// Cumulative layout shift, rounded to four decimal places.
    pub cls: Option<f64>,
}

/// Timing delta against a second "live" deployment of the same site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiveComparison {
    Timing {
        live_url: String,
        live_load_time_ms: u64,
        delta_ms: i64,
    },
    Error {
        error: String,
    },
}
