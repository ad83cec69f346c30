//! Markup-to-PDF conversion through a shared headless browser session.
//!
//! Exactly one browser process serves the whole deployment. It is launched
//! lazily under a mutex (at most one start attempt at a time), shared across
//! requests, and relaunched on the next request if it goes away. Every
//! conversion runs in its own ephemeral page so concurrent conversions never
//! share DOM state; the page is torn down on every exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::EngineSettings;

const SOURCE: &str = "application::engine";

pub(crate) const METRIC_ENGINE_LAUNCH_TOTAL: &str = "pergamena_engine_launch_total";
pub(crate) const METRIC_CONVERT_MS: &str = "pergamena_convert_ms";

// A4 paper, in inches.
const PAPER_WIDTH_IN: f64 = 8.27;
const PAPER_HEIGHT_IN: f64 = 11.69;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rendering engine unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("conversion failed while {stage}: {reason}")]
    Conversion { stage: &'static str, reason: String },
    #[error("conversion timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    fn conversion(stage: &'static str, reason: impl ToString) -> Self {
        Self::Conversion {
            stage,
            reason: reason.to_string(),
        }
    }
}

struct EngineSession {
    browser: Arc<Browser>,
    generation: u64,
}

/// Owner of the shared rendering engine process.
pub struct PdfEngine {
    settings: EngineSettings,
    session: Arc<Mutex<Option<EngineSession>>>,
    generation: AtomicU64,
}

impl PdfEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            session: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Start the engine ahead of the first conversion request.
    pub async fn warm(&self) -> Result<(), EngineError> {
        self.ensure_session().await.map(|_| ())
    }

    /// Convert markup into a paginated PDF: A4, background graphics, and the
    /// header/footer band enabled.
    pub async fn convert(&self, markup: &str) -> Result<Bytes, EngineError> {
        let started_at = Instant::now();
        let browser = self.ensure_session().await?;

        let outcome = match timeout(
            self.settings.convert_timeout,
            self.print_page(&browser, markup),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::Timeout(self.settings.convert_timeout)),
        };

        match &outcome {
            Ok(bytes) => {
                histogram!(METRIC_CONVERT_MS)
                    .record(started_at.elapsed().as_secs_f64() * 1000.0);
                info!(
                    target = SOURCE,
                    op = "convert",
                    result = "ok",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    markup_bytes = markup.len(),
                    pdf_bytes = bytes.len(),
                    "Converted markup to PDF"
                );
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "convert",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    markup_bytes = markup.len(),
                    error = %err,
                    "Markup conversion failed"
                );
            }
        }

        outcome
    }

    /// Hand out the shared browser, launching it if absent. The mutex
    /// guarantees at most one launch attempt proceeds at a time.
    async fn ensure_session(&self) -> Result<Arc<Browser>, EngineError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.browser.clone());
        }
        let session = self.launch().await?;
        let browser = session.browser.clone();
        *slot = Some(session);
        Ok(browser)
    }

    async fn launch(&self) -> Result<EngineSession, EngineError> {
        let mut builder = BrowserConfig::builder();
        if let Some(path) = self.settings.executable.as_ref() {
            builder = builder.chrome_executable(path);
        }
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &self.settings.extra_args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|reason| EngineError::Unavailable { reason })?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (browser, mut handler) = timeout(self.settings.startup_timeout, Browser::launch(config))
            .await
            .map_err(|_| EngineError::Unavailable {
                reason: format!(
                    "launch timed out after {:?}",
                    self.settings.startup_timeout
                ),
            })?
            .map_err(|err| EngineError::Unavailable {
                reason: err.to_string(),
            })?;

        counter!(METRIC_ENGINE_LAUNCH_TOTAL).increment(1);
        info!(
            target = SOURCE,
            op = "launch",
            generation,
            "Rendering engine started"
        );

        let slot = Arc::clone(&self.session);
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            // The event stream ends when the browser process goes away.
            // Clear the slot so the next request relaunches, unless a newer
            // session already replaced this one.
            let mut slot = slot.lock().await;
            if slot
                .as_ref()
                .is_some_and(|session| session.generation == generation)
            {
                *slot = None;
                warn!(
                    target = SOURCE,
                    op = "session_watch",
                    generation,
                    "Rendering engine session ended; restarting on next request"
                );
            }
        });

        Ok(EngineSession {
            browser: Arc::new(browser),
            generation,
        })
    }

    async fn print_page(&self, browser: &Browser, markup: &str) -> Result<Bytes, EngineError> {
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                // A failed page spawn usually means the browser went away;
                // clear the session so the next request relaunches.
                self.reset().await;
                return Err(EngineError::conversion("opening rendering context", err));
            }
        };

        let outcome = drive_page(&page, markup).await;

        if let Err(err) = page.close().await {
            warn!(
                target = SOURCE,
                op = "close_page",
                error = %err,
                "Failed to close ephemeral rendering context"
            );
        }

        outcome
    }

    async fn reset(&self) {
        let mut slot = self.session.lock().await;
        *slot = None;
    }
}

async fn drive_page(page: &Page, markup: &str) -> Result<Bytes, EngineError> {
    wait_for_fonts(page).await?;

    // Structural DOM parse is enough: generated markup embeds no external
    // network resources, so waiting for network idle only adds latency.
    page.set_content(markup)
        .await
        .map_err(|err| EngineError::conversion("injecting markup", err))?;

    // Font loading may complete asynchronously after content injection.
    wait_for_fonts(page).await?;

    let params = PrintToPdfParams {
        paper_width: Some(PAPER_WIDTH_IN),
        paper_height: Some(PAPER_HEIGHT_IN),
        print_background: Some(true),
        display_header_footer: Some(true),
        ..Default::default()
    };
    let pdf = page
        .pdf(params)
        .await
        .map_err(|err| EngineError::conversion("printing to PDF", err))?;

    Ok(Bytes::from(pdf))
}

async fn wait_for_fonts(page: &Page) -> Result<(), EngineError> {
    let eval = EvaluateParams::builder()
        .expression("document.fonts.ready")
        .await_promise(true)
        .build()
        .map_err(|reason| EngineError::Conversion {
            stage: "awaiting fonts",
            reason,
        })?;
    page.evaluate(eval)
        .await
        .map_err(|err| EngineError::conversion("awaiting fonts", err))?;
    Ok(())
}
