use rocky_core::{IdleType, RenderError, WaitConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::EventClassifier;
use super::promoter::LongPollPromoter;
use super::signal::InteractiveSignal;
use super::tracker::RequestTracker;

/// How a successful wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The network stayed quiet for the whole quiet window
    NetworkIdle,
    /// The browser reported the interactive milestone
    Interactive,
}

/// Waits for one navigation to finish loading.
///
/// Built fresh for every navigation: it owns the request tracker and the
/// classifier that feeds it, and races the idle signal, the interactive
/// signal, the deadline and the caller's cancellation. `auto` lets both
/// signals race and takes whichever comes first.
///
/// Events may reach the classifier before [`WaitCoordinator::wait`] is
/// called. An idle signal buffered in that window is only honoured if the
/// tracker still agrees the network is quiet.
pub struct WaitCoordinator {
    idle_type: IdleType,
    config: WaitConfig,
    tracker: RequestTracker,
    classifier: Arc<EventClassifier>,
    idle_rx: mpsc::Receiver<u64>,
    interactive_rx: mpsc::Receiver<()>,
}

impl WaitCoordinator {
    /// Validates the configuration. Nothing is started yet.
    pub fn new(config: &WaitConfig) -> Result<Self, RenderError> {
        let idle_type = config.validate()?;
        let (tracker, idle_rx) = RequestTracker::new(config.quiet_window, config.max_inflight);
        let (signal, interactive_rx) = InteractiveSignal::new();
        let classifier = Arc::new(EventClassifier::new(idle_type, tracker.clone(), signal));
        Ok(Self {
            idle_type,
            config: config.clone(),
            tracker,
            classifier,
            idle_rx,
            interactive_rx,
        })
    }

    pub fn idle_type(&self) -> IdleType {
        self.idle_type
    }

    /// Event sink for this navigation. Safe to call from any task.
    pub fn classifier(&self) -> Arc<EventClassifier> {
        Arc::clone(&self.classifier)
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Block until the page is ready, the deadline passes or `cancel` fires.
    pub async fn wait(mut self, cancel: &CancellationToken) -> Result<WaitOutcome, RenderError> {
        let started = Instant::now();
        let _promoter = if self.idle_type.watches_network() {
            // the page may already be quiet
            self.tracker.evaluate();
            Some(LongPollPromoter::start(
                self.tracker.clone(),
                self.config.promote_interval,
                self.config.long_poll_threshold,
            ))
        } else {
            None
        };

        let deadline = sleep(self.config.timeout);
        tokio::pin!(deadline);
        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    break Err(RenderError::cancelled("wait cancelled by caller").with_context(
                        json!({ "elapsed_ms": started.elapsed().as_millis() as u64 }),
                    ));
                }
                Some(generation) = self.idle_rx.recv() => {
                    if self.tracker.idle_holds(generation) {
                        break Ok(WaitOutcome::NetworkIdle);
                    }
                    debug!(generation, active = self.tracker.count_active(), "stale idle signal dropped");
                }
                Some(()) = self.interactive_rx.recv() => break Ok(WaitOutcome::Interactive),
                _ = &mut deadline => {
                    if self.idle_reached() {
                        break Ok(WaitOutcome::NetworkIdle);
                    }
                    break Err(self.deadline_error());
                }
            }
        };
        self.tracker.stop();

        match &result {
            Ok(outcome) => info!(
                ?outcome,
                idle_type = %self.idle_type,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "page ready"
            ),
            Err(e) => warn!(error = %e, idle_type = %self.idle_type, "wait ended without page ready"),
        }
        result
    }

    // An idle timer due at the deadline instant wins, whether or not its
    // task has run yet.
    fn idle_reached(&mut self) -> bool {
        while let Ok(generation) = self.idle_rx.try_recv() {
            if self.tracker.idle_holds(generation) {
                return true;
            }
        }
        self.tracker.idle_due()
    }

    fn deadline_error(&self) -> RenderError {
        let records = self.tracker.snapshot();
        let active = records.iter().filter(|r| !r.ignored).count();
        let requests: Vec<_> = records.iter().map(|r| r.to_json()).collect();
        RenderError::deadline_exceeded(format!(
            "page not ready after {}ms ({} requests still active)",
            self.config.timeout.as_millis(),
            active
        ))
        .with_context(json!({
            "timeout_ms": self.config.timeout.as_millis() as u64,
            "idle_type": self.idle_type.as_str(),
            "active": active,
            "requests": requests,
        }))
    }
}
