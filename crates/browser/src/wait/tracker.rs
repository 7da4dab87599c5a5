use parking_lot::Mutex;
use rocky_core::{LoaderId, RequestId, ResourceKind};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// One network request seen during the current navigation.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub id: RequestId,
    pub started: Instant,
    pub kind: ResourceKind,
    pub url: String,
    /// Ignored records stay registered but no longer block idle.
    pub ignored: bool,
}

impl RequestRecord {
    fn new(id: RequestId, kind: ResourceKind, url: String) -> Self {
        Self {
            id,
            started: Instant::now(),
            kind,
            url,
            ignored: false,
        }
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id.as_str(),
            "kind": self.kind.as_str(),
            "url": self.url,
            "age_ms": self.age().as_millis() as u64,
            "ignored": self.ignored,
        })
    }
}

struct IdleTimer {
    handle: AbortHandle,
    fires_at: Instant,
}

#[derive(Default)]
struct TrackerState {
    active: HashMap<RequestId, RequestRecord>,
    by_loader: HashMap<LoaderId, RequestId>,
    idle_timer: Option<IdleTimer>,
    // bumped on every arm/disarm so a superseded timer or signal can tell it is stale
    generation: u64,
    stopped: bool,
}

impl TrackerState {
    fn count_active(&self) -> usize {
        self.active.values().filter(|r| !r.ignored).count()
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.handle.abort();
        }
        self.generation += 1;
    }
}

struct Shared {
    state: Mutex<TrackerState>,
    quiet_window: Duration,
    max_inflight: usize,
    idle_done: mpsc::Sender<u64>,
}

/// In-flight request registry for one navigation, together with the idle
/// timer that fires once the registry has stayed quiet long enough.
///
/// Every mutation re-evaluates the timer under the same lock: at or below
/// `max_inflight` active requests the timer restarts with the full quiet
/// window, above it the timer is stopped.
///
/// Idle signals carry the generation of the timer that sent them. A signal
/// only counts if [`RequestTracker::idle_holds`] still accepts it when it is
/// received.
#[derive(Clone)]
pub struct RequestTracker {
    shared: Arc<Shared>,
}

impl RequestTracker {
    /// Returns the tracker and the receiving end of its idle signal.
    pub fn new(quiet_window: Duration, max_inflight: usize) -> (Self, mpsc::Receiver<u64>) {
        let (idle_done, idle_rx) = mpsc::channel(1);
        let tracker = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState::default()),
                quiet_window,
                max_inflight,
                idle_done,
            }),
        };
        (tracker, idle_rx)
    }

    pub fn quiet_window(&self) -> Duration {
        self.shared.quiet_window
    }

    pub fn max_inflight(&self) -> usize {
        self.shared.max_inflight
    }

    /// Register a request and return the active count.
    pub fn add(&self, id: RequestId, kind: ResourceKind, url: impl Into<String>) -> usize {
        let mut state = self.shared.state.lock();
        state
            .active
            .insert(id.clone(), RequestRecord::new(id, kind, url.into()));
        self.maybe_arm(&mut state);
        state.count_active()
    }

    /// Register the main document request of `loader_id`.
    pub fn add_for_loader(
        &self,
        loader_id: LoaderId,
        id: RequestId,
        kind: ResourceKind,
        url: impl Into<String>,
    ) -> usize {
        let mut state = self.shared.state.lock();
        state
            .active
            .insert(id.clone(), RequestRecord::new(id.clone(), kind, url.into()));
        state.by_loader.insert(loader_id, id);
        self.maybe_arm(&mut state);
        state.count_active()
    }

    /// Drop a request. Unknown ids are fine, a request can be removed by
    /// both its own completion event and its loader's lifecycle event.
    pub fn remove(&self, id: &RequestId) -> usize {
        let mut state = self.shared.state.lock();
        state.active.remove(id);
        self.maybe_arm(&mut state);
        state.count_active()
    }

    /// Drop the document request bound to `loader_id`, if any.
    pub fn remove_for_loader(&self, loader_id: &LoaderId) -> Option<usize> {
        let mut state = self.shared.state.lock();
        let id = state.by_loader.remove(loader_id)?;
        state.active.remove(&id);
        self.maybe_arm(&mut state);
        Some(state.count_active())
    }

    pub fn count_active(&self) -> usize {
        self.shared.state.lock().count_active()
    }

    /// Total records, ignored ones included.
    pub fn len(&self) -> usize {
        self.shared.state.lock().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ignored(&self, id: &RequestId) -> Option<bool> {
        self.shared.state.lock().active.get(id).map(|r| r.ignored)
    }

    /// Mark long-lived XHR/fetch requests as ignored. Returns how many were
    /// promoted, or `None` once the tracker is stopped.
    ///
    /// The timer is only re-evaluated when something was promoted; a sweep
    /// that changes nothing must not restart the quiet window.
    pub fn promote_long_polls(&self, threshold: Duration) -> Option<usize> {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return None;
        }
        let now = Instant::now();
        let mut promoted = 0;
        for record in state.active.values_mut() {
            if record.kind.is_long_poll_candidate()
                && !record.ignored
                && now.duration_since(record.started) > threshold
            {
                debug!(request_id = %record.id, url = %record.url, "ignoring long-poll request");
                record.ignored = true;
                promoted += 1;
            }
        }
        if promoted > 0 {
            self.maybe_arm(&mut state);
        }
        Some(promoted)
    }

    /// Run the arm/disarm decision against the current state.
    pub fn evaluate(&self) {
        let mut state = self.shared.state.lock();
        self.maybe_arm(&mut state);
    }

    /// Stop the idle timer for good. Later mutations never re-arm it.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.stopped = true;
        state.stop_timer();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().idle_timer.is_some()
    }

    /// Whether an idle signal sent by timer `generation` is still valid:
    /// nothing has touched the registry since it fired and the network is
    /// still at or below the threshold.
    pub fn idle_holds(&self, generation: u64) -> bool {
        let state = self.shared.state.lock();
        !state.stopped
            && state.generation == generation
            && state.count_active() <= self.shared.max_inflight
    }

    /// Whether the pending idle timer is due but its task has not run yet.
    pub fn idle_due(&self) -> bool {
        let state = self.shared.state.lock();
        !state.stopped
            && state.count_active() <= self.shared.max_inflight
            && state
                .idle_timer
                .as_ref()
                .is_some_and(|timer| timer.fires_at <= Instant::now())
    }

    /// Records still registered, oldest first.
    pub fn snapshot(&self) -> Vec<RequestRecord> {
        let state = self.shared.state.lock();
        let mut records: Vec<_> = state.active.values().cloned().collect();
        records.sort_by_key(|r| r.started);
        records
    }

    fn maybe_arm(&self, state: &mut TrackerState) {
        if state.stopped {
            return;
        }
        let active = state.count_active();
        if active <= self.shared.max_inflight {
            self.start_or_reset_timer(state);
        } else {
            if state.idle_timer.is_some() {
                trace!(active, "network busy, idle timer stopped");
            }
            state.stop_timer();
        }
    }

    fn start_or_reset_timer(&self, state: &mut TrackerState) {
        state.stop_timer();
        let generation = state.generation;
        let shared = Arc::downgrade(&self.shared);
        let fires_at = Instant::now() + self.shared.quiet_window;
        let timer = tokio::spawn(async move {
            sleep_until(fires_at).await;
            fire_idle(shared, generation);
        });
        state.idle_timer = Some(IdleTimer {
            handle: timer.abort_handle(),
            fires_at,
        });
    }
}

fn fire_idle(shared: Weak<Shared>, generation: u64) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let idle = {
        let mut state = shared.state.lock();
        if state.stopped || state.generation != generation {
            return;
        }
        state.idle_timer = None;
        state.count_active() <= shared.max_inflight
    };
    if idle && shared.idle_done.try_send(generation).is_err() {
        trace!("idle signal already pending or wait finished, dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn assert_elapsed_about(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + ms(10),
            "expected ~{:?}, got {:?}",
            expected,
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn count_tracks_registered_requests() {
        let (tracker, _idle) = RequestTracker::new(ms(500), 0);
        assert_eq!(tracker.add("1".into(), ResourceKind::Script, "https://a/1.js"), 1);
        assert_eq!(tracker.add("2".into(), ResourceKind::Image, "https://a/2.png"), 2);
        assert_eq!(tracker.add("2".into(), ResourceKind::Image, "https://a/2.png"), 2);
        assert_eq!(tracker.remove(&"1".into()), 1);
        assert_eq!(tracker.remove(&"1".into()), 1);
        assert_eq!(tracker.remove(&"unknown".into()), 1);
        assert_eq!(tracker.remove(&"2".into()), 0);
        assert_eq!(tracker.count_active(), 0);
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_fires_quiet_window_after_last_removal() {
        let (tracker, mut idle) = RequestTracker::new(ms(500), 0);
        let start = Instant::now();
        tracker.add("A".into(), ResourceKind::Script, "https://a/app.js");
        assert!(!tracker.is_armed());
        sleep(ms(100)).await;
        tracker.remove(&"A".into());
        idle.recv().await.unwrap();
        assert_elapsed_about(start, ms(600));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_below_threshold_resets_the_window() {
        let (tracker, mut idle) = RequestTracker::new(ms(500), 5);
        let start = Instant::now();
        for i in 0..3 {
            tracker.add(RequestId::new(i.to_string()), ResourceKind::Image, "https://a/i.png");
            sleep(ms(100)).await;
        }
        // last add at t=200
        idle.recv().await.unwrap();
        assert_elapsed_about(start, ms(700));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_network_never_fires() {
        let (tracker, mut idle) = RequestTracker::new(ms(500), 0);
        tracker.evaluate();
        assert!(tracker.is_armed());
        tracker.add("A".into(), ResourceKind::Document, "https://a/");
        assert!(!tracker.is_armed());
        sleep(ms(5_000)).await;
        assert_eq!(idle.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_timer() {
        let (tracker, mut idle) = RequestTracker::new(ms(500), 0);
        tracker.evaluate();
        tracker.stop();
        assert!(tracker.is_stopped());
        tracker.add("A".into(), ResourceKind::Script, "https://a/app.js");
        tracker.remove(&"A".into());
        assert!(!tracker.is_armed());
        sleep(ms(2_000)).await;
        assert_eq!(idle.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(tracker.promote_long_polls(ms(0)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_fire_is_dropped_while_signal_pending() {
        let (tracker, mut idle) = RequestTracker::new(ms(100), 0);
        tracker.evaluate();
        sleep(ms(150)).await;
        tracker.evaluate();
        sleep(ms(150)).await;
        let first = idle.try_recv().unwrap();
        assert!(!tracker.idle_holds(first));
        assert_eq!(idle.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn signal_goes_stale_once_the_network_is_busy_again() {
        let (tracker, mut idle) = RequestTracker::new(ms(500), 0);
        tracker.add("A".into(), ResourceKind::Script, "https://a/app.js");
        tracker.remove(&"A".into());
        sleep(ms(600)).await;
        let generation = idle.try_recv().unwrap();
        assert!(tracker.idle_holds(generation));

        // the timer already fired, a new request still invalidates its signal
        tracker.add("B".into(), ResourceKind::Script, "https://a/late.js");
        assert!(!tracker.idle_holds(generation));
        tracker.remove(&"B".into());
        assert!(!tracker.idle_holds(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_not_due_before_the_window_or_while_busy() {
        let (tracker, _idle) = RequestTracker::new(ms(500), 1);
        tracker.add("doc".into(), ResourceKind::Document, "https://a/");
        assert!(tracker.is_armed());
        assert!(!tracker.idle_due());
        tracker.add("js".into(), ResourceKind::Script, "https://a/app.js");
        assert!(!tracker.idle_due());
        tracker.stop();
        assert!(!tracker.idle_due());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_after_receiver_dropped_is_harmless() {
        let (tracker, idle) = RequestTracker::new(ms(100), 0);
        drop(idle);
        tracker.evaluate();
        sleep(ms(200)).await;
        assert!(!tracker.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn loader_binding_removes_document_request() {
        let (tracker, _idle) = RequestTracker::new(ms(500), 0);
        tracker.add_for_loader("L1".into(), "R1".into(), ResourceKind::Document, "https://a/");
        tracker.add("R2".into(), ResourceKind::Script, "https://a/app.js");
        assert_eq!(tracker.remove_for_loader(&"L1".into()), Some(1));
        assert_eq!(tracker.remove_for_loader(&"L1".into()), None);
        assert_eq!(tracker.remove_for_loader(&"other".into()), None);
        assert_eq!(tracker.is_ignored(&"R1".into()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn promotes_only_old_long_poll_requests() {
        let (tracker, _idle) = RequestTracker::new(ms(500), 0);
        tracker.add("xhr".into(), ResourceKind::Xhr, "https://a/poll");
        tracker.add("js".into(), ResourceKind::Script, "https://a/slow.js");
        sleep(ms(1_000)).await;
        tracker.add("fetch".into(), ResourceKind::Fetch, "https://a/api");
        sleep(ms(4_500)).await;

        assert_eq!(tracker.promote_long_polls(Duration::from_secs(5)), Some(1));
        assert_eq!(tracker.is_ignored(&"xhr".into()), Some(true));
        assert_eq!(tracker.is_ignored(&"js".into()), Some(false));
        assert_eq!(tracker.is_ignored(&"fetch".into()), Some(false));
        assert_eq!(tracker.count_active(), 2);
        assert_eq!(tracker.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_oldest_first() {
        let (tracker, _idle) = RequestTracker::new(ms(500), 0);
        tracker.add("b".into(), ResourceKind::Script, "https://a/b.js");
        sleep(ms(10)).await;
        tracker.add("a".into(), ResourceKind::Script, "https://a/a.js");
        let ids: Vec<_> = tracker.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RequestId::from("b"), RequestId::from("a")]);
        let json = tracker.snapshot()[0].to_json();
        assert_eq!(json["kind"], "Script");
        assert_eq!(json["ignored"], false);
    }
}
