use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

/// Cooperative cancellation flag shared through a [`RequestContext`](super::RequestContext).
///
/// Cancellation is advisory: handlers that care check [`is_cancelled`](Self::is_cancelled)
/// at convenient points. Nothing forcibly stops a running handler.
///
/// Clones share one flag. A [`child`](Self::child) has its own flag and
/// deadline but also reports its parent's cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle {
    state: Arc<CancelState>,
    parent: Option<Box<CancellationHandle>>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle cancelled with this one, whose own cancel stays local.
    pub fn child(&self) -> Self {
        Self {
            state: Arc::default(),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once `cancel()` was called or the deadline has passed, here or
    /// on a parent.
    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self.deadline().is_some_and(|deadline| Instant::now() >= deadline) {
            return true;
        }
        self.parent.as_ref().is_some_and(|parent| parent.is_cancelled())
    }

    /// Arm a deadline. An earlier deadline already in place wins.
    pub fn set_deadline(&self, deadline: Instant) {
        if let Ok(mut current) = self.state.deadline.lock() {
            match *current {
                Some(existing) if existing <= deadline => {}
                _ => *current = Some(deadline),
            }
        }
    }

    /// The earliest deadline armed on this handle or a parent.
    pub fn deadline(&self) -> Option<Instant> {
        let own = self.state.deadline.lock().ok().and_then(|d| *d);
        let inherited = self.parent.as_ref().and_then(|parent| parent.deadline());
        match (own, inherited) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
