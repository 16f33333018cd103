//! Background sweeper thread.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::sweeper::{OutboxSweeper, SweepStats};

/// Runs [`OutboxSweeper::sweep`] on its configured interval until stopped.
///
/// ## Example
///
/// ```ignore
/// use std::sync::Arc;
/// use courier_rust::outbox::{OutboxSweeper, SweeperConfig, SweeperThread};
///
/// let sweeper = OutboxSweeper::new(mediator.clone(), SweeperConfig::default());
/// let thread = SweeperThread::spawn(sweeper);
///
/// // ... do work ...
///
/// let stats = thread.stop();
/// println!("Swept {} messages", stats.cleared.sent);
/// ```
pub struct SweeperThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SweepStats>>,
}

impl SweeperThread {
    pub fn spawn(sweeper: OutboxSweeper) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = SweepStats::default();
            let interval = sweeper.config().interval();
            loop {
                stats.merge(&sweeper.sweep());
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
            debug!(passes = stats.passes, sent = stats.cleared.sent, "sweeper stopped");
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the sweeper to stop and wait for it to finish.
    /// Returns the accumulated statistics.
    pub fn stop(mut self) -> SweepStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => SweepStats::default(),
        }
    }

    /// Signal the sweeper to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for SweeperThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
