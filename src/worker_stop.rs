//! One-shot broadcast used by a worker to tell running activities that it has begun a graceful
//! shutdown. Activities should wind down before the worker's stop grace period elapses, after
//! which the worker cancels their contexts. Observing the signal does not cancel anything.

use tokio_util::sync::CancellationToken;

/// Create a linked stop handle and signal. Only the handle can fire the signal, and it can do so
/// exactly once since [WorkerStopHandle::stop] consumes it.
pub fn stop_signal() -> (WorkerStopHandle, WorkerStopSignal) {
    let token = CancellationToken::new();
    (
        WorkerStopHandle {
            token: token.clone(),
        },
        WorkerStopSignal { token },
    )
}

/// Owned by the worker. Dropping it without calling [WorkerStopHandle::stop] leaves the signal
/// unfired forever.
#[derive(Debug)]
pub struct WorkerStopHandle {
    token: CancellationToken,
}

impl WorkerStopHandle {
    /// Another read-only view of the signal this handle controls
    pub fn signal(&self) -> WorkerStopSignal {
        WorkerStopSignal {
            token: self.token.clone(),
        }
    }

    /// Fire the signal, waking everything waiting on [WorkerStopSignal::stopping]
    pub fn stop(self) {
        self.token.cancel()
    }
}

/// Read-only view of the worker stop signal. Any number of clones may observe it concurrently.
///
/// The default signal is not linked to any handle and never fires, which is what local activities
/// receive.
#[derive(Clone, Debug, Default)]
pub struct WorkerStopSignal {
    token: CancellationToken,
}

impl WorkerStopSignal {
    /// Returns true once the owning worker has begun shutting down
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the owning worker begins shutting down. Resolves immediately if it already
    /// has.
    pub async fn stopping(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn all_readers_observe_stop() {
        let (handle, signal) = stop_signal();
        let readers: Vec<_> = (0..5)
            .map(|_| {
                let s = signal.clone();
                tokio::spawn(async move { s.stopping().await })
            })
            .collect();
        assert!(!signal.is_stopping());
        handle.stop();
        for r in readers {
            tokio::time::timeout(Duration::from_secs(1), r)
                .await
                .unwrap()
                .unwrap();
        }
        assert!(signal.is_stopping());
        // Observing an already-fired signal is immediate and repeatable
        signal.stopping().await;
        signal.stopping().await;
    }

    #[tokio::test(start_paused = true)]
    async fn default_signal_never_fires() {
        let signal = WorkerStopSignal::default();
        let res = tokio::time::timeout(Duration::from_secs(60), signal.stopping()).await;
        assert!(res.is_err());
        assert!(!signal.is_stopping());
    }

    #[test]
    fn handle_hands_out_linked_signals() {
        let (handle, _) = stop_signal();
        let late = handle.signal();
        handle.stop();
        assert!(late.is_stopping());
    }
}
