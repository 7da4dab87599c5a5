use rocky_core::RenderError;

/// Classify a browser-side error by its text.
pub fn to_render_error(e: impl std::fmt::Display, action: &str) -> RenderError {
    let s = e.to_string();
    if s.contains("timeout") || s.contains("Timeout") {
        RenderError::deadline_exceeded(format!("{} timed out: {}", action, s))
    } else if s.contains("net::ERR_") || s.contains("navigation") || s.contains("Navigation") {
        RenderError::navigation_error(format!("{} navigation failed: {}", action, s))
    } else {
        RenderError::browser_error(format!("{} failed: {}", action, s))
    }
    .with_context(serde_json::json!({ "action": action }))
}
