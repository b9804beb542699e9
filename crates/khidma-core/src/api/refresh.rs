//! Single-flight coordination of session refreshes.
//!
//! Every caller that hits an expired session joins the waiter queue. Only the caller that
//! finds no refresh in flight starts one; the refresh runs as its own task so it settles
//! even when that caller goes away. Settling clears the in-flight flag first and then
//! hands the same outcome to every queued waiter.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Why a session refresh did not produce a usable session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RefreshFailure(String);

impl RefreshFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type RefreshOutcome = Result<(), RefreshFailure>;

#[derive(Debug, Default)]
struct RefreshState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_progress
    }

    pub fn queued_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Wait for a refresh to settle, starting one with `start` if none is in flight.
    ///
    /// `start` is only invoked by the caller that initiates the refresh.
    pub async fn refresh<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let initiate = {
            let mut state = self.lock();
            state.waiters.push(sender);
            !std::mem::replace(&mut state.in_progress, true)
        };

        if initiate {
            debug!("starting session refresh");
            let guard = SettleGuard {
                coordinator: self.clone(),
                settled: false,
            };
            let refresh = start();
            tokio::spawn(async move {
                let mut guard = guard;
                let outcome = refresh.await;
                guard.settle(outcome);
            });
        } else {
            debug!("session refresh already in flight; queued");
        }

        receiver.await.unwrap_or_else(|_| {
            Err(RefreshFailure::new(
                "session refresh ended without an outcome",
            ))
        })
    }

    fn settle(&self, outcome: RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "session refresh settled"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles the coordinator with a failure if the refresh task is torn down before it
/// produced an outcome.
struct SettleGuard {
    coordinator: RefreshCoordinator,
    settled: bool,
}

impl SettleGuard {
    fn settle(&mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(Err(RefreshFailure::new("session refresh was aborted")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let coordinator = RefreshCoordinator::new();
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = coordinator.clone();
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(move || async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(())
                    })
                    .await
            }));
        }

        while coordinator.queued_waiters() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(coordinator.is_refreshing());
        release.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(()));
        }
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.queued_waiters(), 0);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_resets_state() {
        let coordinator = RefreshCoordinator::new();
        let release = Arc::new(Notify::new());

        let first = {
            let coordinator = coordinator.clone();
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                coordinator
                    .refresh(move || async move {
                        release.notified().await;
                        Err(RefreshFailure::new("rejected"))
                    })
                    .await
            })
        };
        while !coordinator.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let second = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .refresh(|| async { Err(RefreshFailure::new("second refresh started")) })
                    .await
            })
        };
        while coordinator.queued_waiters() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        release.notify_one();

        let failure = Err(RefreshFailure::new("rejected"));
        assert_eq!(first.await.unwrap(), failure);
        assert_eq!(second.await.unwrap(), failure);
        assert!(!coordinator.is_refreshing());

        let retry = coordinator.refresh(|| async { Ok(()) }).await;
        assert_eq!(retry, Ok(()), "a later refresh can start after a failure");
    }

    #[tokio::test]
    async fn dropped_initiator_does_not_strand_waiters() {
        let coordinator = RefreshCoordinator::new();
        let release = Arc::new(Notify::new());

        let initiator = {
            let coordinator = coordinator.clone();
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                coordinator
                    .refresh(move || async move {
                        release.notified().await;
                        Ok(())
                    })
                    .await
            })
        };
        while !coordinator.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        initiator.abort();

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh(|| async { Ok(()) }).await })
        };
        while coordinator.queued_waiters() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        release.notify_one();

        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert!(!coordinator.is_refreshing());
    }
}
