//! One-shot completion signalling between the render thread and a blocked control thread.
//!
//! The render engine receives the [`CompletionSignal`] half and fires it once it no longer
//! touches the drawable. The control thread parks on the [`CompletionLatch`] half without a
//! timeout. The latch must not be awaited from inside an async runtime.

use tokio::sync::oneshot;

/// Creates a connected signal/latch pair.
pub fn completion() -> (CompletionSignal, CompletionLatch) {
    let (tx, rx) = oneshot::channel();
    (CompletionSignal(tx), CompletionLatch(rx))
}

/// Sending half. Consumed when fired, so it can fire at most once.
#[derive(Debug)]
pub struct CompletionSignal(oneshot::Sender<()>);

impl CompletionSignal {
    /// Fires the signal and wakes the waiting thread.
    pub fn count_down(self) {
        // the waiter may already be gone, nothing left to wake then
        let _ = self.0.send(());
    }
}

/// Receiving half, awaited by the control thread.
#[derive(Debug)]
pub struct CompletionLatch(oneshot::Receiver<()>);

impl CompletionLatch {
    /// Blocks until the signal fires.
    ///
    /// Returns `false` when the signal was dropped without firing: its owner is gone and can no
    /// longer complete anything, so waiting longer would hang forever.
    pub fn await_uninterruptibly(self) -> bool {
        self.0.blocking_recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn waits_for_signal_from_other_thread() {
        let (signal, latch) = completion();
        let started = Instant::now();

        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            signal.count_down();
        });

        assert!(latch.await_uninterruptibly());
        assert!(started.elapsed() >= Duration::from_millis(30));
        worker.join().unwrap();
    }

    #[test]
    fn already_fired_signal_returns_immediately() {
        let (signal, latch) = completion();
        signal.count_down();
        assert!(latch.await_uninterruptibly());
    }

    #[test]
    fn dropped_signal_unblocks_with_false() {
        let (signal, latch) = completion();
        thread::spawn(move || drop(signal)).join().unwrap();
        assert!(!latch.await_uninterruptibly());
    }

    #[test]
    fn firing_without_waiter_is_harmless() {
        let (signal, latch) = completion();
        drop(latch);
        signal.count_down();
    }
}
