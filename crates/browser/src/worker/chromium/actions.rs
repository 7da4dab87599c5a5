use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use rocky_core::{PdfOption, RenderError};
use serde_json::json;

/// What to produce once the page is ready.
#[derive(Debug, Clone)]
pub enum Capture {
    /// Outer HTML of the document
    Html,
    /// Print to PDF
    Pdf(PrintToPdfParams),
}

impl Capture {
    pub fn name(&self) -> &'static str {
        match self {
            Capture::Html => "html",
            Capture::Pdf(_) => "pdf",
        }
    }
}

pub async fn capture(page: &Page, capture: &Capture) -> Result<Vec<u8>, RenderError> {
    match capture {
        Capture::Html => {
            let html = page.content().await.map_err(|e| {
                RenderError::capture_error(format!("serializing DOM failed: {}", e))
                    .with_context(json!({ "capture": "html" }))
            })?;
            Ok(html.into_bytes())
        }
        Capture::Pdf(params) => page.pdf(params.clone()).await.map_err(|e| {
            RenderError::capture_error(format!("printing PDF failed: {}", e))
                .with_context(json!({ "capture": "pdf" }))
        }),
    }
}

/// Print parameters for `opts`. Unset lengths keep the browser defaults.
pub fn pdf_params(opts: &PdfOption) -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(opts.landscape),
        display_header_footer: Some(opts.display_header_footer),
        paper_width: opts.paper_width_in(),
        paper_height: opts.paper_height_in(),
        margin_top: opts.margin_top_in(),
        margin_bottom: opts.margin_bottom_in(),
        margin_left: opts.margin_left_in(),
        margin_right: opts.margin_right_in(),
        ..Default::default()
    }
}
