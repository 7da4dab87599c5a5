use serde::{Deserialize, Serialize};

/// Error categories for callers that need to tell outcomes apart
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid idle type or option value, rejected before anything starts
    Configuration,
    /// The wait gave up because its deadline expired
    DeadlineExceeded,
    /// The caller cancelled the wait before the deadline
    Cancelled,
    /// The navigate command failed
    Navigation,
    /// Browser launch or protocol errors
    Browser,
    /// DOM serialization or PDF printing failed
    Capture,
    /// Local I/O while preparing or persisting output
    Io,
}

/// Structured error with context for diagnosis
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{category:?}] {message}")]
pub struct RenderError {
    /// Error category for programmatic handling
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Optional context (URL, still-active requests, option values, etc.)
    pub context: serde_json::Value,
    /// Whether trying the same render again could succeed
    pub recoverable: bool,
    /// Suggested retry delay in milliseconds
    pub retry_after_ms: Option<u64>,
}

impl RenderError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
            retry_after_ms: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self.recoverable = true;
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::DeadlineExceeded, message).recoverable()
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Cancelled, message)
    }

    pub fn navigation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Navigation, message).with_retry_delay(1500)
    }

    pub fn browser_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Browser, message)
    }

    pub fn capture_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Capture, message)
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Io, message)
    }

    pub fn is_configuration(&self) -> bool {
        self.category == ErrorCategory::Configuration
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.category == ErrorCategory::DeadlineExceeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::io_error(e.to_string())
    }
}
