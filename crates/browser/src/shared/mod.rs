pub mod config;
pub mod errors;

pub use config::browser_flags;
pub use errors::to_render_error;
