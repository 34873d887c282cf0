//! Subscribe-and-refetch loop.
//!
//! Live updates are delivered as "something changed" signals, and state is
//! re-derived by reading the platform again rather than by patching local
//! copies. The loop below serializes those re-reads: queued events are
//! drained before each one, so a burst of notifications coalesces into a
//! single refetch and at most one re-read per subscription is ever in
//! flight.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::feed::Subscription;

/// Run the refetch loop until the feed closes or `cancel` fires.
///
/// `refetch` is invoked after each batch of matching events. Its errors are
/// its own to report; the loop keeps running either way. Cancellation while
/// a refetch is pending discards the trigger rather than applying a stale
/// result.
pub async fn run<F, Fut>(mut subscription: Subscription, cancel: CancellationToken, refetch: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(subscription = %subscription.id(), "Refetch loop cancelled");
                return;
            }
            event = subscription.next() => {
                if event.is_none() {
                    tracing::debug!(subscription = %subscription.id(), "Change feed closed");
                    return;
                }
                // Coalesce: everything queued so far is covered by one re-read.
                subscription.drain();
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    () = refetch() => {}
                }
            }
        }
    }
}

/// Spawn [`run`] on the current runtime.
pub fn spawn<F, Fut>(
    subscription: Subscription,
    cancel: CancellationToken,
    refetch: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run(subscription, cancel, refetch))
}
