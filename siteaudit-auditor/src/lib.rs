//! Browser-driven page auditing and crawling.
//!
//! Given a base URL and a reusable rendering session, this crate discovers
//! every reachable page, renders each in a real browser engine, and
//! produces one [`AuditRecord`] per page covering timing, SEO metadata,
//! image integrity, accessibility violations, responsive-layout breakage
//! and an optional timing comparison against a live deployment.

pub mod auditor;
pub mod axe;
pub mod chrome;
pub mod crawler;
pub mod discover;
pub mod error;
pub mod record;
pub mod rules;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use auditor::audit_page;
pub use axe::{AccessibilityRunner, AxeRunner};
pub use chrome::ChromeSession;
pub use crawler::{Crawler, ProgressCallback};
pub use discover::discover_links;
pub use error::{AuditError, Result};
pub use record::AuditRecord;
pub use session::{RenderSession, WaitCondition};
