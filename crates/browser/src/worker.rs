pub mod chromium;

pub use chromium::{ChromiumRenderer, navigate_and_wait};
