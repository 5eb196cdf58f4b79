//! chromiumoxide-backed [`RenderSession`].
//!
//! One headless Chrome process, one tab. CDP events (console, uncaught
//! exceptions, network responses) are accumulated by background tasks and
//! drained by the auditor between phases.

use crate::error::{AuditError, Result};
use crate::record::ErrorEntry;
use crate::session::{DEFAULT_VIEWPORT, RenderSession, WaitCondition};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Settle window after the load event for the strict wait condition.
const NETWORK_QUIET: Duration = Duration::from_millis(500);
/// Poll interval while waiting for the DOM-ready state.
const READY_POLL: Duration = Duration::from_millis(100);

/// Extra Chrome launch flags. Local and staging targets (DDEV in
/// particular) serve self-signed certificates, so certificate errors are
/// ignored; the user agent identifies the auditor in server logs.
const BROWSER_ARGS: [&str; 2] = [
    "--ignore-certificate-errors",
    "--user-agent=SiteAudit/1.0 (chromiumoxide)",
];

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    listener_tasks: Vec<JoinHandle<()>>,
    errors: Arc<Mutex<Vec<ErrorEntry>>>,
    responses: Arc<Mutex<HashMap<String, u64>>>,
    document_status: Arc<Mutex<Option<u16>>>,
}

impl ChromeSession {
    /// Launch a headless browser and open the single tab used for the run.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(DEFAULT_VIEWPORT.width, DEFAULT_VIEWPORT.height)
            .args(BROWSER_ARGS)
            .build()
            .map_err(AuditError::Setup)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {e}");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        let errors = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(HashMap::new()));
        let document_status = Arc::new(Mutex::new(None));
        let mut listener_tasks = Vec::new();

        let mut console_events = page.event_listener::<EventConsoleApiCalled>().await?;
        {
            let errors = errors.clone();
            listener_tasks.push(tokio::spawn(async move {
                while let Some(event) = console_events.next().await {
                    let kind = match event.r#type {
                        ConsoleApiCalledType::Error => "error",
                        ConsoleApiCalledType::Warning => "warning",
                        _ => continue,
                    };
                    let message = event
                        .args
                        .iter()
                        .filter_map(|arg| {
                            arg.value
                                .as_ref()
                                .map(|v| v.to_string())
                                .or_else(|| arg.description.clone())
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    errors.lock().unwrap().push(ErrorEntry::new(kind, message));
                }
            }));
        }

        let mut exception_events = page.event_listener::<EventExceptionThrown>().await?;
        {
            let errors = errors.clone();
            listener_tasks.push(tokio::spawn(async move {
                while let Some(event) = exception_events.next().await {
                    let details = &event.exception_details;
                    let message = details
                        .exception
                        .as_ref()
                        .and_then(|e| e.description.clone())
                        .unwrap_or_else(|| details.text.clone());
                    errors
                        .lock()
                        .unwrap()
                        .push(ErrorEntry::new("js_error", message));
                }
            }));
        }

        let mut response_events = page.event_listener::<EventResponseReceived>().await?;
        {
            let responses = responses.clone();
            let document_status = document_status.clone();
            listener_tasks.push(tokio::spawn(async move {
                while let Some(event) = response_events.next().await {
                    let bytes = content_length(&event);
                    responses
                        .lock()
                        .unwrap()
                        .insert(event.response.url.clone(), bytes);
                    if matches!(event.r#type, ResourceType::Document) {
                        *document_status.lock().unwrap() =
                            u16::try_from(event.response.status).ok();
                    }
                }
            }));
        }

        Ok(Self {
            browser,
            page,
            handler_task,
            listener_tasks,
            errors,
            responses,
            document_status,
        })
    }

    /// Close the tab and the browser process.
    pub async fn close(mut self) -> Result<()> {
        for task in self.listener_tasks.drain(..) {
            task.abort();
        }
        if let Err(e) = self.browser.close().await {
            warn!("browser close: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("browser wait: {e}");
        }
        self.handler_task.abort();
        Ok(())
    }
}

/// Content-length of a response event, 0 when the header is absent.
fn content_length(event: &EventResponseReceived) -> u64 {
    serde_json::to_value(&event.response.headers)
        .ok()
        .and_then(|headers| {
            headers
                .get("content-length")
                .or_else(|| headers.get("Content-Length"))
                .cloned()
        })
        .and_then(|v| match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        })
        .unwrap_or(0)
}

impl RenderSession for ChromeSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitCondition,
        timeout: Duration,
    ) -> Result<Option<u16>> {
        *self.document_status.lock().unwrap() = None;

        let attempt = async {
            self.page.goto(url).await?;
            match wait {
                WaitCondition::NetworkSettled => {
                    self.page.wait_for_navigation().await?;
                    tokio::time::sleep(NETWORK_QUIET).await;
                }
                WaitCondition::DomReady => loop {
                    let state = self
                        .page
                        .evaluate_expression("document.readyState")
                        .await?
                        .value()
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_default();
                    if state == "interactive" || state == "complete" {
                        break;
                    }
                    tokio::time::sleep(READY_POLL).await;
                },
            }
            Ok::<(), AuditError>(())
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| AuditError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            })??;

        Ok(*self.document_status.lock().unwrap())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        // Function-style snippets go through callFunctionOn so returned
        // promises are awaited; everything else is a plain expression.
        let trimmed = expression.trim_start();
        let looks_like_function = trimmed.starts_with("()")
            || trimmed.starts_with("async")
            || trimmed.starts_with("function");

        let result = if looks_like_function {
            self.page.evaluate_function(expression.to_string()).await
        } else {
            self.page.evaluate_expression(expression.to_string()).await
        }
        .map_err(|e| AuditError::Evaluation(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(AuditError::Setup)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        self.page.save_screenshot(params, path).await?;
        Ok(())
    }

    fn reset_tracking(&mut self) {
        self.errors.lock().unwrap().clear();
        self.responses.lock().unwrap().clear();
        *self.document_status.lock().unwrap() = None;
    }

    fn take_errors(&mut self) -> Vec<ErrorEntry> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }

    fn response_log(&self) -> Vec<(String, u64)> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .map(|(url, bytes)| (url.clone(), *bytes))
            .collect()
    }
}
