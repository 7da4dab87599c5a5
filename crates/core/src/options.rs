use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{IdleType, RenderError};

/// Parameters of the load-completion wait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// One of `auto`, `networkIdle`, `InteractiveTime`
    pub idle_type: String,
    /// How long the network has to stay quiet before the page counts as idle
    pub quiet_window: Duration,
    /// Requests still in flight that are tolerated while idle
    pub max_inflight: usize,
    /// Age after which an open XHR/fetch request stops blocking idle
    pub long_poll_threshold: Duration,
    /// How often open requests are checked for long polls
    pub promote_interval: Duration,
    /// Overall deadline for the wait
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            idle_type: IdleType::Auto.as_str().to_string(),
            quiet_window: Duration::from_millis(500),
            max_inflight: 0,
            long_poll_threshold: Duration::from_secs(5),
            promote_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl WaitConfig {
    pub fn with_idle_type(mut self, idle_type: impl Into<String>) -> Self {
        self.idle_type = idle_type.into();
        self
    }

    /// Network counts as idle once at most `max_inflight` requests stay in
    /// flight for `idle_wait`.
    pub fn with_idle_check(mut self, idle_wait: Duration, max_inflight: usize) -> Self {
        self.quiet_window = idle_wait;
        self.max_inflight = max_inflight;
        self
    }

    pub fn with_long_poll(mut self, threshold: Duration, interval: Duration) -> Self {
        self.long_poll_threshold = threshold;
        self.promote_interval = interval;
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    /// Validate and return the parsed idle type.
    pub fn validate(&self) -> Result<IdleType, RenderError> {
        let idle_type: IdleType = self.idle_type.parse()?;
        if self.quiet_window.is_zero() {
            return Err(RenderError::configuration("quiet window must be greater than 0"));
        }
        if self.promote_interval.is_zero() {
            return Err(RenderError::configuration(
                "long-poll promote interval must be greater than 0",
            ));
        }
        if self.timeout.is_zero() {
            return Err(RenderError::configuration("timeout must be greater than 0"));
        }
        Ok(idle_type)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConf {
    /// Use this Chrome/Chromium binary instead of auto-detection
    pub browser_exec_path: Option<PathBuf>,
    /// Forward raw protocol traffic to debug logs
    pub chromium_debug: bool,
    /// Flags needed inside docker / lambda style sandboxes
    pub container: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConf {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub image_load: bool,
    pub user_agent: Option<String>,
    pub wait: WaitConfig,
}

impl Default for RendererConf {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            image_load: false,
            user_agent: None,
            wait: WaitConfig::default(),
        }
    }
}

impl RendererConf {
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn validate(&self) -> Result<IdleType, RenderError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(RenderError::configuration(
                "browser width / height value should be greater than 0",
            )
            .with_context(serde_json::json!({
                "window_width": self.window_width,
                "window_height": self.window_height,
            })));
        }
        self.wait.validate()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RendererOption {
    pub browser: BrowserConf,
    pub renderer: RendererConf,
}

impl RendererOption {
    pub fn validate(&self) -> Result<IdleType, RenderError> {
        self.renderer.validate()
    }
}

/// Print layout. Lengths are centimeters; zero keeps the browser default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfOption {
    pub browser: BrowserConf,
    pub renderer: RendererConf,
    pub landscape: bool,
    pub display_header_footer: bool,
    pub paper_width_cm: f64,
    pub paper_height_cm: f64,
    pub margin_top_cm: f64,
    pub margin_bottom_cm: f64,
    pub margin_left_cm: f64,
    pub margin_right_cm: f64,
}

impl PdfOption {
    pub fn validate(&self) -> Result<IdleType, RenderError> {
        if self.paper_width_cm < 0.0 || self.paper_height_cm < 0.0 {
            return Err(RenderError::configuration(
                "paper width / height value should not be negative",
            ));
        }
        let margins = [
            self.margin_top_cm,
            self.margin_bottom_cm,
            self.margin_left_cm,
            self.margin_right_cm,
        ];
        if margins.iter().any(|m| *m < 0.0) {
            return Err(RenderError::configuration("margin values should not be negative")
                .with_context(serde_json::json!({ "margins_cm": margins })));
        }
        self.renderer.validate()
    }

    pub fn paper_width_in(&self) -> Option<f64> {
        non_zero_inch(self.paper_width_cm)
    }

    pub fn paper_height_in(&self) -> Option<f64> {
        non_zero_inch(self.paper_height_cm)
    }

    pub fn margin_top_in(&self) -> Option<f64> {
        non_zero_inch(self.margin_top_cm)
    }

    pub fn margin_bottom_in(&self) -> Option<f64> {
        non_zero_inch(self.margin_bottom_cm)
    }

    pub fn margin_left_in(&self) -> Option<f64> {
        non_zero_inch(self.margin_left_cm)
    }

    pub fn margin_right_in(&self) -> Option<f64> {
        non_zero_inch(self.margin_right_cm)
    }
}

fn non_zero_inch(cm: f64) -> Option<f64> {
    if cm == 0.0 { None } else { Some(cm_to_inch(cm)) }
}

/// Convert centimeters to inches, rounded to two decimals.
pub fn cm_to_inch(cm: f64) -> f64 {
    ((cm / 2.54) * 100.0).round() / 100.0
}
