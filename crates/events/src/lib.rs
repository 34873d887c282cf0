//! Skypanel change-notification infrastructure.
//!
//! The hosted platform pushes database change events to subscribed clients;
//! this crate is the local side of that channel:
//!
//! - [`ChangeEvent`] — the canonical change envelope (collection, kind, row).
//! - [`ChangeFeed`] — in-process fan-out hub backed by
//!   `tokio::sync::broadcast`, fed by the realtime subscriber (or by the
//!   in-memory platform double in tests).
//! - [`Subscription`] — a filtered receiver handle; dropping it releases
//!   the slot.
//! - [`refetch`] — the subscribe-and-refetch loop with at most one
//!   in-flight re-read per subscription.

pub mod change;
pub mod feed;
pub mod refetch;

pub use change::{ChangeEvent, ChangeKind, EventFilter};
pub use feed::{ChangeFeed, Subscription};
