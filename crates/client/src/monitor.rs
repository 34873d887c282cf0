//! Fleet monitor (admin view).
//!
//! Reads the platform's `technician_status_view` and refreshes whenever
//! works or users change. The view is computed server-side; the client
//! never derives the counters itself.

use skypanel_core::roles::{can_access, Action, Role};
use skypanel_core::CoreError;
use skypanel_events::{refetch, ChangeFeed, EventFilter, Subscription};
use skypanel_gateway::{DataGateway, Direction, ReadQuery};
use tokio_util::sync::CancellationToken;

use crate::collections;
use crate::model::{parse_rows, TechnicianStatus};

pub struct FleetMonitor<G> {
    gateway: std::sync::Arc<G>,
    viewer_role: Role,
}

impl<G: DataGateway> FleetMonitor<G> {
    pub fn new(gateway: std::sync::Arc<G>, viewer_role: Role) -> Self {
        Self {
            gateway,
            viewer_role,
        }
    }

    /// One row per technician with current workload counters.
    pub async fn snapshot(&self) -> Result<Vec<TechnicianStatus>, CoreError> {
        if !can_access(self.viewer_role, Action::MonitorFleet) {
            return Err(CoreError::Forbidden("Fleet monitor is admin only".into()));
        }
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::TECHNICIAN_STATUS)
                    .order_by("full_name", Direction::Asc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }
}

/// The monitor refreshes on any change to works or users; subscribing to
/// both collections needs two subscriptions on one feed.
pub fn subscriptions(feed: &ChangeFeed) -> (Subscription, Subscription) {
    (
        feed.subscribe(EventFilter::collection(collections::WORKS)),
        feed.subscribe(EventFilter::collection(collections::USERS)),
    )
}

/// Re-run `on_change` whenever works or users change.
pub fn watch<F, Fut>(
    feed: &ChangeFeed,
    cancel: CancellationToken,
    on_change: F,
) -> Vec<tokio::task::JoinHandle<()>>
where
    F: Fn() -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let (works, users) = subscriptions(feed);
    vec![
        refetch::spawn(works, cancel.clone(), on_change.clone()),
        refetch::spawn(users, cancel, on_change),
    ]
}
