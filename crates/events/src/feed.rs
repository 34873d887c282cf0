//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! [`ChangeFeed`] is the local fan-out hub for [`ChangeEvent`]s. The wire
//! subscriber (or the in-memory platform double) publishes into it; each
//! view takes a filtered [`Subscription`] on activation and drops it on
//! deactivation, which releases the receiver slot unconditionally.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::change::{ChangeEvent, EventFilter};

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out hub for change events. Share via `Arc<ChangeFeed>` (or clone;
/// clones publish into the same channel).
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed events are dropped and
    /// slow subscribers observe a lag; a subsequent refetch heals the gap.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; the platform
    /// remains the source of truth either way.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe with a filter. Events not matching `filter` are skipped
    /// inside [`Subscription::next`].
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            filter,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A filtered handle onto the change feed.
///
/// Dropping the subscription releases its slot; there is no explicit
/// unsubscribe call to forget.
pub struct Subscription {
    id: Uuid,
    filter: EventFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Opaque id, used in log fields.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event matching the filter.
    ///
    /// Returns `None` once the feed is closed. A lagged receiver logs and
    /// keeps going: the events lost were only refresh triggers and the
    /// next matching event (or an explicit refetch) re-derives state.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(subscription = %self.id, missed, "Change feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Discard every event that is already queued, matching or not.
    ///
    /// Used by the refetch loop to coalesce a burst of notifications into a
    /// single re-read.
    pub fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
    }
}
