//! Load-completion detection.
//!
//! Browser events go through an [`EventClassifier`] into a [`RequestTracker`]
//! and an [`InteractiveSignal`]; a [`WaitCoordinator`] races the resulting
//! signals against a deadline and the caller's cancellation.

pub mod classifier;
pub mod coordinator;
pub mod promoter;
pub mod signal;
pub mod tracker;

pub use classifier::{EventClassifier, INTERACTIVE_MILESTONE, LOAD_MILESTONES};
pub use coordinator::{WaitCoordinator, WaitOutcome};
pub use promoter::LongPollPromoter;
pub use signal::InteractiveSignal;
pub use tracker::{RequestRecord, RequestTracker};
