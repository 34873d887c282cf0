//! The technician's current-work lifecycle.
//!
//! A technician is either idle or working exactly one order. Assignment
//! and completion go through the platform's atomic procedures; local state
//! is then re-derived by reading back, never patched from notifications.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use skypanel_core::roles::Role;
use skypanel_core::types::DbId;
use skypanel_core::work::WorkStatus;
use skypanel_core::CoreError;
use skypanel_events::{refetch, ChangeFeed, EventFilter};
use skypanel_gateway::{DataGateway, Direction, PlatformProcedures, Predicate, ReadQuery};

use crate::collections;
use crate::model::{parse_row, parse_rows, User, WorkOrder};

/// What the technician is doing right now.
#[derive(Debug, Clone)]
pub enum WorkState {
    Idle,
    Working(WorkOrder),
}

impl WorkState {
    pub fn current(&self) -> Option<&WorkOrder> {
        match self {
            WorkState::Idle => None,
            WorkState::Working(work) => Some(work),
        }
    }
}

/// Outcome of asking the platform for the next work order.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    Assigned(WorkOrder),
    NoPendingWork,
}

/// Outcome of completing the current order.
#[derive(Debug, Clone)]
pub enum CompleteOutcome {
    /// Completion chained straight into the next assignment.
    NextAssigned(WorkOrder),
    /// The queue is empty; the technician is idle again.
    AllDone,
}

/// Drives one technician's lifecycle against the platform.
pub struct LifecycleClient<G> {
    gateway: Arc<G>,
    technician_id: DbId,
    state: WorkState,
}

impl<G> LifecycleClient<G>
where
    G: DataGateway + PlatformProcedures,
{
    pub fn new(gateway: Arc<G>, technician_id: DbId) -> Self {
        Self {
            gateway,
            technician_id,
            state: WorkState::Idle,
        }
    }

    pub fn state(&self) -> &WorkState {
        &self.state
    }

    pub fn technician_id(&self) -> DbId {
        self.technician_id
    }

    /// Ask the platform to assign the next pending order.
    ///
    /// Refused while already working: completion (or a pause from the work
    /// list) must free the technician first.
    pub async fn request_next(&mut self) -> Result<RequestOutcome, CoreError> {
        if let WorkState::Working(work) = &self.state {
            return Err(CoreError::Conflict(format!(
                "Already working order {}",
                work.id
            )));
        }

        let row = self
            .gateway
            .assign_next_work(self.technician_id)
            .await
            .map_err(CoreError::from)?;

        match row {
            Some(row) => {
                let work: WorkOrder = parse_row(row)?;
                tracing::info!(work_id = work.id, technician_id = self.technician_id, "Work assigned");
                self.state = WorkState::Working(work.clone());
                Ok(RequestOutcome::Assigned(work))
            }
            None => {
                self.state = WorkState::Idle;
                Ok(RequestOutcome::NoPendingWork)
            }
        }
    }

    /// Complete the current order and chain into the next one, if any.
    pub async fn complete(&mut self) -> Result<CompleteOutcome, CoreError> {
        let WorkState::Working(work) = &self.state else {
            return Err(CoreError::Conflict("No work order in progress".into()));
        };
        let work_id = work.id;

        let next = self
            .gateway
            .complete_and_get_next(work_id, self.technician_id)
            .await
            .map_err(CoreError::from)?;

        match next {
            Some(row) => {
                let work: WorkOrder = parse_row(row)?;
                tracing::info!(
                    completed = work_id,
                    next = work.id,
                    technician_id = self.technician_id,
                    "Completed and reassigned",
                );
                self.state = WorkState::Working(work.clone());
                Ok(CompleteOutcome::NextAssigned(work))
            }
            None => {
                tracing::info!(completed = work_id, technician_id = self.technician_id, "Completed, queue empty");
                self.state = WorkState::Idle;
                Ok(CompleteOutcome::AllDone)
            }
        }
    }

    /// Bring on a partner for the current order.
    pub async fn add_partner(&mut self, partner_id: DbId) -> Result<(), CoreError> {
        let WorkState::Working(work) = &self.state else {
            return Err(CoreError::Conflict("No work order in progress".into()));
        };
        if partner_id == self.technician_id {
            return Err(CoreError::Validation(
                "A technician cannot partner with themselves".into(),
            ));
        }
        if work.partner_technician_id.is_some() {
            return Err(CoreError::Conflict(format!(
                "Order {} already has a partner",
                work.id
            )));
        }

        let work_id = work.id;
        let affected = self
            .gateway
            .update(
                collections::WORKS,
                work_id,
                serde_json::json!({"partner_technician_id": partner_id}),
                Some(Predicate::eq("partner_technician_id", serde_json::Value::Null)),
            )
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::Conflict(format!(
                "Order {work_id} gained a partner concurrently"
            )));
        }

        self.refresh().await
    }

    /// Technicians who could join the current order: active, role
    /// TECHNICIAN, and not this technician. Feeds the partner picker.
    pub async fn partner_candidates(&self) -> Result<Vec<User>, CoreError> {
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::USERS)
                    .filter(Predicate::eq("role", Role::Technician.as_str()))
                    .filter(Predicate::eq("is_active", true))
                    .filter(Predicate::Neq(
                        "id".into(),
                        serde_json::json!(self.technician_id),
                    ))
                    .order_by("full_name", Direction::Asc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// Re-derive the state from the platform.
    ///
    /// The technician's current order is the one in progress where they are
    /// assignee or partner; no such row means idle. This is the only way
    /// state changes outside the explicit operations, so a notification can
    /// never install a stale row.
    pub async fn refresh(&mut self) -> Result<(), CoreError> {
        let me = self.technician_id;
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::WORKS)
                    .filter(Predicate::Or(vec![
                        Predicate::eq("assigned_technician_id", me),
                        Predicate::eq("partner_technician_id", me),
                    ]))
                    .filter(Predicate::eq("status", WorkStatus::InProgress.as_str()))
                    .limit(1),
            )
            .await
            .map_err(CoreError::from)?;

        self.state = match rows.into_iter().next() {
            Some(row) => WorkState::Working(parse_row(row)?),
            None => WorkState::Idle,
        };
        Ok(())
    }

    /// The change-feed filter covering this technician's orders: updates
    /// where they appear as assignee or partner.
    pub fn event_filter(&self) -> EventFilter {
        EventFilter::collection(collections::WORKS)
            .column_eq("assigned_technician_id", serde_json::json!(self.technician_id))
            .column_eq("partner_technician_id", serde_json::json!(self.technician_id))
    }
}

/// Keep a shared lifecycle client fresh from the change feed.
///
/// Each matching notification triggers one [`LifecycleClient::refresh`];
/// bursts coalesce and cancellation discards pending triggers.
pub fn watch<G>(
    client: Arc<Mutex<LifecycleClient<G>>>,
    feed: &ChangeFeed,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    G: DataGateway + PlatformProcedures + Send + Sync + 'static,
{
    // try_lock is fine here: watch() runs during setup, before the client
    // is shared with any running task.
    let filter = match client.try_lock() {
        Ok(client) => client.event_filter(),
        Err(_) => EventFilter::collection(collections::WORKS),
    };
    let subscription = feed.subscribe(filter);
    refetch::spawn(subscription, cancel, move || {
        let client = client.clone();
        async move {
            let mut client = client.lock().await;
            if let Err(e) = client.refresh().await {
                tracing::warn!(error = %e, "Lifecycle refresh failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use skypanel_gateway::MemoryGateway;

    fn work(id: DbId, status: &str, created_at: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Work {id}"),
            "status": status,
            "pinned": false,
            "archived": false,
            "created_at": created_at,
            "assigned_technician_id": null,
            "partner_technician_id": null,
            "locked_by": null,
        })
    }

    async fn gateway() -> Arc<MemoryGateway> {
        Arc::new(MemoryGateway::new())
    }

    #[tokio::test]
    async fn request_next_assigns_and_transitions_to_working() {
        let gateway = gateway().await;
        gateway.seed("works", work(42, "PENDING", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        let outcome = client.request_next().await.unwrap();
        let RequestOutcome::Assigned(assigned) = outcome else {
            panic!("expected assignment");
        };
        assert_eq!(assigned.id, 42);
        assert_eq!(assigned.status, WorkStatus::InProgress);
        assert_eq!(client.state().current().unwrap().id, 42);
    }

    #[tokio::test]
    async fn request_next_with_empty_queue_stays_idle() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "COMPLETED", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        assert_matches!(client.request_next().await.unwrap(), RequestOutcome::NoPendingWork);
        assert!(client.state().current().is_none());
    }

    #[tokio::test]
    async fn request_next_while_working_is_a_conflict() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        gateway.seed("works", work(2, "PENDING", "2026-01-02T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        client.request_next().await.unwrap();
        assert_matches!(client.request_next().await, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn complete_chains_into_next_order() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        gateway.seed("works", work(2, "PENDING", "2026-01-02T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        client.request_next().await.unwrap();
        let outcome = client.complete().await.unwrap();
        let CompleteOutcome::NextAssigned(next) = outcome else {
            panic!("expected chained assignment");
        };
        assert_eq!(next.id, 2);
        assert_eq!(client.state().current().unwrap().id, 2);
    }

    #[tokio::test]
    async fn complete_with_empty_queue_goes_idle() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        client.request_next().await.unwrap();
        assert_matches!(client.complete().await.unwrap(), CompleteOutcome::AllDone);
        assert!(client.state().current().is_none());
    }

    #[tokio::test]
    async fn complete_while_idle_is_a_conflict() {
        let gateway = gateway().await;
        let mut client = LifecycleClient::new(gateway, 7);
        assert_matches!(client.complete().await, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn add_partner_updates_order_and_state() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        client.request_next().await.unwrap();
        client.add_partner(9).await.unwrap();
        assert_eq!(
            client.state().current().unwrap().partner_technician_id,
            Some(9)
        );
    }

    #[tokio::test]
    async fn add_partner_rejects_self_and_second_partner() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway, 7);

        client.request_next().await.unwrap();
        assert_matches!(client.add_partner(7).await, Err(CoreError::Validation(_)));
        client.add_partner(9).await.unwrap();
        assert_matches!(client.add_partner(11).await, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn partner_candidates_are_active_technicians_excluding_self() {
        let gateway = gateway().await;
        for (id, name, role, active) in [
            (7, "Tech Seven", "TECHNICIAN", true),
            (8, "Zoe Martin", "TECHNICIAN", true),
            (9, "Ada Bloom", "TECHNICIAN", true),
            (10, "Benched Tech", "TECHNICIAN", false),
            (11, "The Admin", "ADMIN", true),
        ] {
            gateway
                .seed(
                    "users",
                    json!({
                        "id": id,
                        "username": format!("user{id}"),
                        "full_name": name,
                        "role": role,
                        "is_active": active,
                    }),
                )
                .await;
        }

        let client = LifecycleClient::new(gateway, 7);
        let names: Vec<String> = client
            .partner_candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.full_name)
            .collect();
        assert_eq!(names, vec!["Ada Bloom", "Zoe Martin"]);
    }

    #[tokio::test]
    async fn refresh_sees_partner_side_assignment() {
        let gateway = gateway().await;
        let mut row = work(1, "IN_PROGRESS", "2026-01-01T00:00:00Z");
        row["assigned_technician_id"] = json!(3);
        row["partner_technician_id"] = json!(7);
        gateway.seed("works", row).await;

        let mut client = LifecycleClient::new(gateway, 7);
        client.refresh().await.unwrap();
        assert_eq!(client.state().current().unwrap().id, 1);
    }

    #[tokio::test]
    async fn refresh_goes_idle_when_order_is_taken_away() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        let mut client = LifecycleClient::new(gateway.clone(), 7);

        client.request_next().await.unwrap();
        gateway
            .update(
                collections::WORKS,
                1,
                json!({"status": "COMPLETED", "assigned_technician_id": null}),
                None,
            )
            .await
            .unwrap();

        client.refresh().await.unwrap();
        assert!(client.state().current().is_none());
    }

    #[tokio::test]
    async fn watch_refreshes_on_matching_update() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;

        let mut client = LifecycleClient::new(gateway.clone(), 7);
        client.request_next().await.unwrap();
        let client = Arc::new(Mutex::new(client));

        let cancel = CancellationToken::new();
        let handle = watch(client.clone(), &gateway.feed(), cancel.clone());

        // Another session completes the order out from under this one.
        gateway
            .update(
                collections::WORKS,
                1,
                json!({"status": "COMPLETED", "assigned_technician_id": 7}),
                None,
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(client.lock().await.state().current().is_none());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn watch_ignores_other_technicians_updates() {
        let gateway = gateway().await;
        gateway.seed("works", work(1, "PENDING", "2026-01-01T00:00:00Z")).await;
        gateway.seed("works", work(2, "PENDING", "2026-01-02T00:00:00Z")).await;

        let mut client = LifecycleClient::new(gateway.clone(), 7);
        client.request_next().await.unwrap();
        let client = Arc::new(Mutex::new(client));

        let cancel = CancellationToken::new();
        let handle = watch(client.clone(), &gateway.feed(), cancel.clone());

        // An update touching only technician 99's order must not disturb us.
        gateway
            .update(
                collections::WORKS,
                2,
                json!({"status": "IN_PROGRESS", "assigned_technician_id": 99}),
                None,
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(client.lock().await.state().current().unwrap().id, 1);

        cancel.cancel();
        handle.await.unwrap();
    }
}
