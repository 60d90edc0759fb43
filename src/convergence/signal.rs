//! One-shot completion signal with bounded wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Why a wait on the signal ended without it being fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    TimedOut,
    /// Every sender is gone, so the signal can never fire.
    Abandoned,
}

/// Fires once; later fulfills and waits are no-ops.
#[derive(Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fulfill the signal. Returns true only for the call that fired it.
    pub fn fulfill(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_fulfilled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until fulfilled or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> Result<(), WaitError> {
        let mut rx = self.tx.subscribe();
        let fired = async { rx.wait_for(|done| *done).await.map(|_| ()) };
        let outcome = tokio::time::timeout(timeout, fired).await;
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(WaitError::Abandoned),
            Err(_) => Err(WaitError::TimedOut),
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfill_fires_once() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_fulfilled());
        assert!(signal.fulfill());
        assert!(!signal.fulfill());
        assert!(signal.is_fulfilled());
    }

    #[tokio::test]
    async fn test_wait_returns_after_fulfill() {
        let signal = CompletionSignal::new();
        let firing = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            firing.fulfill();
        });

        assert_eq!(signal.wait(Duration::from_secs(5)).await, Ok(()));
        // Already fulfilled: returns immediately.
        assert_eq!(signal.wait(Duration::from_millis(1)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let signal = CompletionSignal::new();
        assert_eq!(
            signal.wait(Duration::from_millis(20)).await,
            Err(WaitError::TimedOut)
        );
    }
}
