use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Single-fire notification for the page's interactive milestone.
pub struct InteractiveSignal {
    fired: AtomicBool,
    done: mpsc::Sender<()>,
}

impl InteractiveSignal {
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (done, rx) = mpsc::channel(1);
        let signal = Self {
            fired: AtomicBool::new(false),
            done,
        };
        (signal, rx)
    }

    /// Fire once. Returns false if the signal had already fired.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // receiver gone means the wait already ended
        let _ = self.done.try_send(());
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
