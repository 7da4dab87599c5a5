use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use futures::StreamExt;
use rocky_core::{BrowserConf, PageRenderer, PdfOption, RenderError, RendererConf, RendererOption};
use serde_json::json;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::actions::{self, Capture};
use super::wait::navigate_and_wait;
use crate::shared::{browser_flags, to_render_error};

/// Renders pages in a fresh headless Chromium per call.
pub struct ChromiumRenderer {
    cancel: CancellationToken,
}

struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl Session {
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "closing browser failed");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            debug!(error = %e, dir = %self.user_data_dir.display(), "user data dir not removed");
        }
    }
}

impl ChromiumRenderer {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token aborts every in-flight render of this renderer.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn launch(browser: &BrowserConf, renderer: &RendererConf) -> Result<Session, RenderError> {
        let user_data_dir = std::env::temp_dir().join(format!("rocky-chromium-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            RenderError::io_error(format!("Failed to create temp dir: {}", e))
                .with_context(json!({ "dir": user_data_dir.display().to_string() }))
        })?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if renderer.headless { HeadlessMode::True } else { HeadlessMode::False })
            .window_size(renderer.window_width, renderer.window_height)
            .user_data_dir(&user_data_dir)
            .args(browser_flags(browser, renderer));
        if let Some(path) = &browser.browser_exec_path {
            builder = builder.chrome_executable(path);
        }
        if browser.container {
            debug!("using container browser flags");
            builder = builder.no_sandbox();
        }

        let chrome_cfg = builder
            .build()
            .map_err(|e| RenderError::browser_error(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg)
            .await
            .map_err(|e| RenderError::browser_error(format!("Launch failed: {}", e)))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });
        Ok(Session {
            browser,
            handler,
            user_data_dir,
        })
    }

    async fn render(
        &self,
        url: &str,
        browser: &BrowserConf,
        renderer: &RendererConf,
        capture: Capture,
    ) -> Result<Vec<u8>, RenderError> {
        let start = Instant::now();
        let session = Self::launch(browser, renderer).await?;
        let cancel = self.cancel.child_token();

        let result = async {
            let page = session
                .browser
                .new_page("about:blank")
                .await
                .map_err(|e| to_render_error(e, "NewPage"))?;
            let outcome =
                navigate_and_wait(&page, url, &renderer.wait, browser.chromium_debug, &cancel).await?;
            debug!(url, ?outcome, capture = capture.name(), "capturing");
            actions::capture(&page, &capture).await
        }
        .await;

        session.close().await;
        debug!(url, elapsed_ms = start.elapsed().as_millis() as u64, "render time");

        result.map_err(|e| {
            error!(url, error = %e, "render failed");
            add_url(e, url)
        })
    }
}

impl Default for ChromiumRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn add_url(mut e: RenderError, url: &str) -> RenderError {
    if let Some(context) = e.context.as_object_mut() {
        context.entry("url").or_insert_with(|| json!(url));
    }
    e
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render_page(&self, url: &str, opts: &RendererOption) -> Result<Vec<u8>, RenderError> {
        opts.validate().map_err(|e| add_url(e, url))?;
        self.render(url, &opts.browser, &opts.renderer, Capture::Html)
            .await
    }

    async fn render_pdf(&self, url: &str, opts: &PdfOption) -> Result<Vec<u8>, RenderError> {
        opts.validate().map_err(|e| add_url(e, url))?;
        let params = actions::pdf_params(opts);
        self.render(url, &opts.browser, &opts.renderer, Capture::Pdf(params))
            .await
    }
}
