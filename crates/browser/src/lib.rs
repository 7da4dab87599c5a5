//! Headless Chromium rendering with load-completion detection.
//!
//! The [`wait`] module decides when a navigation is done from the stream of
//! page events; [`worker::chromium`] drives a real browser with it.

pub mod shared;
pub mod wait;
pub mod worker;

pub use wait::{WaitCoordinator, WaitOutcome};
pub use worker::ChromiumRenderer;
