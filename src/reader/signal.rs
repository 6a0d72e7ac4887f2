//! Shared cancellation flag for one read-out.
//!
//! The button listener, the speech reader and the controller all hold a clone
//! of the same [`CancellationSignal`]. It only ever moves from "running" to
//! "cancelled"; there is no way to clear it. A new read-out gets a new signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonic false→true flag shared between the read-out threads.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSignal {
    /// Create a new signal (initially not cancelled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition, so exactly one caller can log the cause.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// Check whether the signal has been set.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_signal_not_cancelled() {
        assert!(!CancellationSignal::new().is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let signal = CancellationSignal::new();
        assert!(signal.cancel());
        assert!(signal.is_cancelled());

        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancellationSignal::new();
        let other = signal.clone();
        other.cancel();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_independent_signals_do_not_share_state() {
        let first = CancellationSignal::new();
        first.cancel();
        assert!(!CancellationSignal::new().is_cancelled());
    }

    #[test]
    fn test_exactly_one_racing_canceller_wins() {
        let signal = CancellationSignal::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.cancel())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_across_threads() {
        let signal = CancellationSignal::new();
        let writer = signal.clone();
        thread::spawn(move || {
            writer.cancel();
        })
        .join()
        .unwrap();
        assert!(signal.is_cancelled());
    }
}
