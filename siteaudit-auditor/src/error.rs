use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("browser setup failed: {0}")]
    Setup(String),

    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("accessibility engine error: {0}")]
    Accessibility(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
