use parking_lot::Mutex;
use rocky_core::{FrameId, IdleType, PageEvent, ResourceKind};
use tracing::{debug, trace, warn};

use super::signal::InteractiveSignal;
use super::tracker::RequestTracker;

/// Lifecycle milestone that marks the page as interactive.
pub const INTERACTIVE_MILESTONE: &str = "InteractiveTime";

/// Lifecycle milestones after which the main document request is done,
/// whether or not its own finished event ever shows up.
pub const LOAD_MILESTONES: [&str; 2] = ["load", "networkIdle"];

/// Routes page events of one navigation into the request tracker and the
/// interactive signal.
pub struct EventClassifier {
    idle_type: IdleType,
    tracker: RequestTracker,
    interactive: InteractiveSignal,
    main_frame: Mutex<Option<FrameId>>,
}

impl EventClassifier {
    pub fn new(idle_type: IdleType, tracker: RequestTracker, interactive: InteractiveSignal) -> Self {
        Self {
            idle_type,
            tracker,
            interactive,
            main_frame: Mutex::new(None),
        }
    }

    /// Seed the main frame when the caller already knows it. A frame set
    /// earlier wins.
    pub fn seed_main_frame(&self, frame_id: FrameId) {
        self.main_frame.lock().get_or_insert(frame_id);
    }

    pub fn main_frame(&self) -> Option<FrameId> {
        self.main_frame.lock().clone()
    }

    pub fn idle_type(&self) -> IdleType {
        self.idle_type
    }

    pub fn handle(&self, event: PageEvent) {
        if let Some(field) = malformed_field(&event) {
            warn!(event = event.name(), field, "dropping page event with empty identifier");
            return;
        }

        match event {
            PageEvent::FrameNavigated {
                frame_id,
                parent_id,
                loader_id,
            } => {
                if parent_id.is_some() {
                    trace!(%frame_id, "child frame navigated");
                    return;
                }
                let mut main_frame = self.main_frame.lock();
                if main_frame.is_none() {
                    debug!(%frame_id, %loader_id, "main frame navigated");
                    *main_frame = Some(frame_id);
                }
            }
            PageEvent::RequestWillBeSent {
                request_id,
                loader_id,
                frame_id,
                kind,
                url,
            } => {
                if !self.idle_type.watches_network() {
                    return;
                }
                if kind.is_noisy() {
                    trace!(%request_id, %kind, %url, "noisy request not tracked");
                    return;
                }
                let main_document = self.is_main_document(kind, frame_id.as_ref());
                let active = if main_document && !loader_id.is_empty() {
                    self.tracker.add_for_loader(loader_id, request_id.clone(), kind, url.as_str())
                } else {
                    if main_document {
                        debug!(%request_id, "main document without loader id, not bound");
                    }
                    self.tracker.add(request_id.clone(), kind, url.as_str())
                };
                debug!(%request_id, %kind, %url, active, "request started");
            }
            PageEvent::LoadingFinished { request_id } => {
                if !self.idle_type.watches_network() {
                    return;
                }
                let active = self.tracker.remove(&request_id);
                debug!(%request_id, active, "request finished");
            }
            PageEvent::LoadingFailed {
                request_id,
                error_text,
            } => {
                if !self.idle_type.watches_network() {
                    return;
                }
                let active = self.tracker.remove(&request_id);
                debug!(%request_id, %error_text, active, "request failed");
            }
            PageEvent::Lifecycle {
                frame_id,
                loader_id,
                name,
            } => {
                if !self.is_main_frame(&frame_id) {
                    trace!(%frame_id, %name, "lifecycle event for child frame");
                    return;
                }
                if LOAD_MILESTONES.contains(&name.as_str()) && self.idle_type.watches_network() {
                    if loader_id.is_empty() {
                        trace!(%frame_id, %name, "lifecycle event without loader id");
                    } else if let Some(active) = self.tracker.remove_for_loader(&loader_id) {
                        debug!(%loader_id, %name, active, "document request closed by lifecycle event");
                    }
                } else if name == INTERACTIVE_MILESTONE
                    && self.idle_type.watches_interactive()
                    && self.interactive.fire()
                {
                    debug!(%frame_id, "page interactive");
                }
            }
        }
    }

    fn is_main_frame(&self, frame_id: &FrameId) -> bool {
        self.main_frame
            .lock()
            .as_ref()
            .is_none_or(|main| main == frame_id)
    }

    // Before the main frame is known the first document request can only
    // belong to it.
    fn is_main_document(&self, kind: ResourceKind, frame_id: Option<&FrameId>) -> bool {
        if kind != ResourceKind::Document {
            return false;
        }
        match (self.main_frame.lock().as_ref(), frame_id) {
            (None, _) => true,
            (Some(main), Some(frame)) => main == frame,
            (Some(_), None) => false,
        }
    }
}

fn malformed_field(event: &PageEvent) -> Option<&'static str> {
    match event {
        PageEvent::FrameNavigated { frame_id, .. } if frame_id.is_empty() => Some("frame_id"),
        PageEvent::RequestWillBeSent { request_id, .. } if request_id.is_empty() => {
            Some("request_id")
        }
        PageEvent::LoadingFinished { request_id } if request_id.is_empty() => Some("request_id"),
        PageEvent::LoadingFailed { request_id, .. } if request_id.is_empty() => Some("request_id"),
        PageEvent::Lifecycle { frame_id, .. } if frame_id.is_empty() => Some("frame_id"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocky_core::RequestId;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    fn setup(idle_type: IdleType) -> (EventClassifier, RequestTracker, mpsc::Receiver<()>) {
        let (tracker, _idle) = RequestTracker::new(Duration::from_millis(500), 0);
        let (signal, interactive) = InteractiveSignal::new();
        let classifier = EventClassifier::new(idle_type, tracker.clone(), signal);
        (classifier, tracker, interactive)
    }

    fn navigated(frame: &str, parent: Option<&str>) -> PageEvent {
        PageEvent::FrameNavigated {
            frame_id: frame.into(),
            parent_id: parent.map(FrameId::from),
            loader_id: "L0".into(),
        }
    }

    fn request(id: &str, loader: &str, frame: &str, kind: ResourceKind) -> PageEvent {
        PageEvent::RequestWillBeSent {
            request_id: id.into(),
            loader_id: loader.into(),
            frame_id: Some(frame.into()),
            kind,
            url: format!("https://example.com/{id}"),
        }
    }

    fn lifecycle(frame: &str, loader: &str, name: &str) -> PageEvent {
        PageEvent::Lifecycle {
            frame_id: frame.into(),
            loader_id: loader.into(),
            name: name.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_top_level_frame_becomes_main() {
        let (classifier, _, _) = setup(IdleType::Auto);
        classifier.handle(navigated("child", Some("main")));
        assert_eq!(classifier.main_frame(), None);
        classifier.handle(navigated("main", None));
        classifier.handle(navigated("other", None));
        assert_eq!(classifier.main_frame(), Some(FrameId::from("main")));
    }

    #[tokio::test(start_paused = true)]
    async fn noisy_requests_are_never_tracked() {
        let (classifier, tracker, _) = setup(IdleType::NetworkIdle);
        for (i, kind) in [
            ResourceKind::EventSource,
            ResourceKind::WebSocket,
            ResourceKind::Media,
            ResourceKind::TextTrack,
            ResourceKind::Ping,
            ResourceKind::Manifest,
        ]
        .into_iter()
        .enumerate()
        {
            classifier.handle(request(&i.to_string(), "L1", "main", kind));
        }
        assert!(tracker.is_empty());
        classifier.handle(request("js", "L1", "main", ResourceKind::Script));
        assert_eq!(tracker.count_active(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_and_failed_remove_requests() {
        let (classifier, tracker, _) = setup(IdleType::Auto);
        classifier.handle(request("a", "L1", "main", ResourceKind::Script));
        classifier.handle(request("b", "L1", "main", ResourceKind::Image));
        classifier.handle(PageEvent::LoadingFinished { request_id: "a".into() });
        classifier.handle(PageEvent::LoadingFailed {
            request_id: "b".into(),
            error_text: "net::ERR_ABORTED".to_string(),
        });
        classifier.handle(PageEvent::LoadingFinished { request_id: "never-seen".into() });
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn load_lifecycle_closes_main_document() {
        let (classifier, tracker, _) = setup(IdleType::NetworkIdle);
        classifier.handle(request("doc", "L1", "main", ResourceKind::Document));
        classifier.handle(navigated("main", None));
        classifier.handle(request("frame-doc", "L2", "child", ResourceKind::Document));
        assert_eq!(tracker.count_active(), 2);

        classifier.handle(lifecycle("main", "L1", "DOMContentLoaded"));
        assert_eq!(tracker.count_active(), 2);
        classifier.handle(lifecycle("main", "L1", "load"));
        assert_eq!(tracker.count_active(), 1);
        assert_eq!(tracker.is_ignored(&RequestId::from("frame-doc")), Some(false));

        // child frame documents are not bound to a loader
        classifier.handle(lifecycle("main", "L2", "networkIdle"));
        assert_eq!(tracker.count_active(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_idle_lifecycle_also_closes_main_document() {
        let (classifier, tracker, _) = setup(IdleType::Auto);
        classifier.seed_main_frame("main".into());
        classifier.handle(request("doc", "L1", "main", ResourceKind::Document));
        classifier.handle(lifecycle("main", "L1", "networkIdle"));
        assert!(tracker.is_empty());
        // duplicate removal path is a no-op
        classifier.handle(PageEvent::LoadingFinished { request_id: "doc".into() });
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_fires_once_for_main_frame() {
        let (classifier, _, mut interactive) = setup(IdleType::Auto);
        classifier.handle(navigated("main", None));
        classifier.handle(lifecycle("child", "L2", INTERACTIVE_MILESTONE));
        assert_eq!(interactive.try_recv(), Err(TryRecvError::Empty));
        classifier.handle(lifecycle("main", "L1", INTERACTIVE_MILESTONE));
        classifier.handle(lifecycle("main", "L1", INTERACTIVE_MILESTONE));
        assert_eq!(interactive.try_recv(), Ok(()));
        assert_eq!(interactive.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_only_strategy_skips_tracking() {
        let (classifier, tracker, mut interactive) = setup(IdleType::InteractiveTime);
        classifier.handle(request("a", "L1", "main", ResourceKind::Script));
        assert!(tracker.is_empty());
        classifier.handle(lifecycle("main", "L1", INTERACTIVE_MILESTONE));
        assert_eq!(interactive.try_recv(), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn network_only_strategy_ignores_interactive() {
        let (classifier, tracker, mut interactive) = setup(IdleType::NetworkIdle);
        classifier.handle(lifecycle("main", "L1", INTERACTIVE_MILESTONE));
        assert_eq!(interactive.try_recv(), Err(TryRecvError::Empty));
        classifier.handle(request("a", "L1", "main", ResourceKind::Script));
        assert_eq!(tracker.count_active(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_loader_id_never_binds_the_document() {
        let (classifier, tracker, _) = setup(IdleType::NetworkIdle);
        classifier.seed_main_frame("main".into());
        classifier.handle(request("doc", "", "main", ResourceKind::Document));
        assert_eq!(tracker.count_active(), 1);

        classifier.handle(lifecycle("main", "", "load"));
        assert_eq!(tracker.count_active(), 1);
        assert_eq!(tracker.remove_for_loader(&"".into()), None);

        classifier.handle(PageEvent::LoadingFinished { request_id: "doc".into() });
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_events_are_dropped() {
        let (classifier, tracker, _) = setup(IdleType::Auto);
        classifier.handle(request("", "L1", "main", ResourceKind::Script));
        classifier.handle(navigated("", None));
        assert!(tracker.is_empty());
        assert_eq!(classifier.main_frame(), None);

        classifier.handle(request("a", "L1", "main", ResourceKind::Script));
        classifier.handle(PageEvent::LoadingFinished { request_id: RequestId::from(" ") });
        assert_eq!(tracker.count_active(), 1);
    }
}
