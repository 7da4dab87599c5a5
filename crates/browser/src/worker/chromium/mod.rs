pub mod actions;
pub mod wait;
pub mod worker;

pub use actions::{Capture, pdf_params};
pub use wait::navigate_and_wait;
pub use worker::ChromiumRenderer;
