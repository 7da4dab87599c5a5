use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::tracker::RequestTracker;

/// Periodic sweep that stops long-lived XHR/fetch requests from blocking idle.
///
/// The sweep task is aborted when the promoter is dropped, and exits on its
/// own once the tracker has been stopped.
pub struct LongPollPromoter {
    task: JoinHandle<()>,
}

impl LongPollPromoter {
    pub fn start(tracker: RequestTracker, interval: Duration, threshold: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tracker.promote_long_polls(threshold) {
                    Some(0) => {}
                    Some(promoted) => {
                        debug!(promoted, active = tracker.count_active(), "long-poll sweep");
                    }
                    None => break,
                }
            }
        });
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for LongPollPromoter {
    fn drop(&mut self) {
        self.task.abort();
    }
}
