use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod event;
pub mod options;

pub use error::{ErrorCategory, RenderError};
pub use event::{FrameId, LoaderId, PageEvent, RequestId, ResourceKind};
pub use options::{BrowserConf, PdfOption, RendererConf, RendererOption, WaitConfig, cm_to_inch};

/// How the renderer decides that a page has finished loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdleType {
    /// Race network quiescence against the interactive milestone, first one wins
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Only network quiescence
    #[serde(rename = "networkIdle")]
    NetworkIdle,
    /// Only the browser's `InteractiveTime` lifecycle milestone
    #[serde(rename = "InteractiveTime")]
    InteractiveTime,
}

impl IdleType {
    pub const VALID: [&'static str; 3] = ["auto", "networkIdle", "InteractiveTime"];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdleType::Auto => "auto",
            IdleType::NetworkIdle => "networkIdle",
            IdleType::InteractiveTime => "InteractiveTime",
        }
    }

    /// Whether request tracking and the idle timer take part in the wait.
    pub fn watches_network(&self) -> bool {
        matches!(self, IdleType::Auto | IdleType::NetworkIdle)
    }

    /// Whether the interactive lifecycle milestone takes part in the wait.
    pub fn watches_interactive(&self) -> bool {
        matches!(self, IdleType::Auto | IdleType::InteractiveTime)
    }
}

impl fmt::Display for IdleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdleType {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(IdleType::Auto),
            "networkIdle" => Ok(IdleType::NetworkIdle),
            "InteractiveTime" => Ok(IdleType::InteractiveTime),
            other => Err(RenderError::configuration(format!(
                "invalid idleType {:?}, expected one of {}",
                other,
                IdleType::VALID.join(", ")
            ))
            .with_context(serde_json::json!({ "idle_type": other }))),
        }
    }
}

/// Checks if the given idle type name is one the renderer understands.
pub fn is_valid_idle_type(idle_type: &str) -> bool {
    IdleType::VALID.contains(&idle_type)
}

/// Something that can turn a URL into a fully rendered artifact.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render the page and return its serialized HTML.
    async fn render_page(&self, url: &str, opts: &RendererOption) -> Result<Vec<u8>, RenderError>;

    /// Render the page and print it to PDF.
    async fn render_pdf(&self, url: &str, opts: &PdfOption) -> Result<Vec<u8>, RenderError>;
}
