//! Reconnecting consumer loop shared by the live projections.
//!
//! A feed opens a backend subscription, forwards every snapshot, and when the
//! subscription fails or ends it reports a degraded state and reopens it with
//! exponential backoff. The last delivered snapshot is never retracted.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::error::MessagingError;
use crate::config::SubscriptionSettings;
use crate::providers::store::{Result, Subscription};

/// Health of a live projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedStatus {
    /// Waiting for the first snapshot.
    #[default]
    Connecting,
    /// Snapshots are flowing.
    Live,
    /// The subscription dropped; showing the last good snapshot while
    /// reconnect attempt `attempt` is pending.
    Stale {
        /// Why the subscription dropped.
        error: MessagingError,
        /// Reconnect attempt number (1-based).
        attempt: u32,
    },
    /// Reconnects are exhausted; the last good snapshot stays visible.
    Failed {
        /// Why the last subscription dropped.
        error: MessagingError,
    },
}

impl FeedStatus {
    /// Returns true if the projection may be out of date.
    pub fn is_stale(&self) -> bool {
        matches!(self, FeedStatus::Stale { .. } | FeedStatus::Failed { .. })
    }

    /// Why the projection is degraded, if it is.
    pub fn error(&self) -> Option<&MessagingError> {
        match self {
            FeedStatus::Stale { error, .. } | FeedStatus::Failed { error } => Some(error),
            FeedStatus::Connecting | FeedStatus::Live => None,
        }
    }
}

/// What a feed reports to its owner.
#[derive(Debug)]
pub(crate) enum FeedUpdate<T> {
    /// A complete snapshot replacing the previous one.
    Snapshot(Vec<T>),
    /// The feed changed health without new data.
    Status(FeedStatus),
}

/// Runs a feed until `cancel` fires or reconnects are exhausted.
///
/// The subscription is dropped (and thereby released) before this returns.
pub(crate) async fn run_feed<T, O, Fut, A>(
    mut open: O,
    policy: SubscriptionSettings,
    cancel: CancellationToken,
    mut apply: A,
) where
    O: FnMut() -> Fut,
    Fut: Future<Output = Result<Subscription<T>>>,
    A: FnMut(FeedUpdate<T>),
{
    let mut attempts: u32 = 0;

    loop {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = open() => opened,
        };

        let error = match opened {
            Ok(mut subscription) => {
                let error = loop {
                    let item = tokio::select! {
                        _ = cancel.cancelled() => return,
                        item = subscription.next() => item,
                    };
                    match item {
                        Some(Ok(snapshot)) => {
                            attempts = 0;
                            apply(FeedUpdate::Snapshot(snapshot));
                        }
                        Some(Err(e)) => break e.to_string(),
                        None => break "subscription ended".to_string(),
                    }
                };
                subscription.unsubscribe();
                error
            }
            Err(e) => e.to_string(),
        };
        let error = MessagingError::Subscription(error);

        if !policy.allows_retry(attempts) {
            tracing::error!(error = %error, attempts, "Giving up on live subscription");
            apply(FeedUpdate::Status(FeedStatus::Failed { error }));
            return;
        }

        attempts += 1;
        let delay = policy.backoff(attempts);
        tracing::warn!(error = %error, attempt = attempts, ?delay, "Live subscription dropped, reconnecting");
        apply(FeedUpdate::Status(FeedStatus::Stale {
            error,
            attempt: attempts,
        }));

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::store::BackendError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn fast_policy(max_retries: Option<u32>) -> SubscriptionSettings {
        SubscriptionSettings {
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            max_retries,
        }
    }

    #[test]
    fn status_stale_flags() {
        assert!(!FeedStatus::Live.is_stale());
        assert!(!FeedStatus::Connecting.is_stale());
        let stale = FeedStatus::Stale {
            error: MessagingError::Subscription("reset".to_string()),
            attempt: 1,
        };
        assert!(stale.is_stale());
        assert!(stale.error().is_some_and(MessagingError::is_retryable));
    }

    #[tokio::test]
    async fn reconnects_after_failure_and_gives_up() {
        // First open: one snapshot, then an error. Every later open fails.
        let opens = Arc::new(Mutex::new(0u32));
        let opens_seen = opens.clone();
        let open = move || {
            let opens = opens.clone();
            async move {
                let n = {
                    let mut guard = opens.lock().unwrap();
                    *guard += 1;
                    *guard
                };
                if n == 1 {
                    let (sender, subscription) = Subscription::channel();
                    sender.send(Ok(vec![1u32])).await;
                    sender
                        .send(Err(BackendError::Connection("reset".to_string())))
                        .await;
                    Ok(subscription)
                } else {
                    Err(BackendError::Connection("refused".to_string()))
                }
            }
        };

        let updates = Arc::new(Mutex::new(VecDeque::new()));
        let sink = updates.clone();
        run_feed(open, fast_policy(Some(2)), CancellationToken::new(), move |u| {
            sink.lock().unwrap().push_back(u)
        })
        .await;

        let updates: Vec<_> = updates.lock().unwrap().drain(..).collect();
        assert!(matches!(&updates[0], FeedUpdate::Snapshot(s) if s == &vec![1]));
        assert!(matches!(
            &updates[1],
            FeedUpdate::Status(FeedStatus::Stale { attempt: 1, error })
                if error == &MessagingError::Subscription("connection error: reset".to_string())
        ));
        assert!(matches!(
            &updates[2],
            FeedUpdate::Status(FeedStatus::Stale { attempt: 2, .. })
        ));
        assert!(matches!(
            &updates[3],
            FeedUpdate::Status(FeedStatus::Failed {
                error: MessagingError::Subscription(reason)
            }) if reason.contains("refused")
        ));
        assert_eq!(updates.len(), 4);
        assert_eq!(*opens_seen.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn cancellation_releases_subscription() {
        let (sender, subscription) = Subscription::<u32>::channel();
        let slot = Arc::new(Mutex::new(Some(subscription)));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                run_feed(
                    move || {
                        let taken = slot.lock().unwrap().take();
                        async move { taken.ok_or(BackendError::Closed) }
                    },
                    fast_policy(None),
                    cancel,
                    |_| {},
                )
                .await
            }
        });

        assert!(sender.send(Ok(vec![1])).await);
        cancel.cancel();
        task.await.unwrap();
        assert!(sender.is_cancelled());
    }
}
