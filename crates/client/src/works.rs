//! The shared work list.
//!
//! Every technician sees the same non-archived list, pinned orders first
//! and newest after that. Claims go through a conditional update: the
//! patch only lands if the order is still in a claimable status, so two
//! technicians racing for the same row get exactly one winner and the
//! loser a clean refusal.

use chrono::{Datelike, NaiveDate, Utc};
use serde_json::json;

use skypanel_core::roles::{can_access, Action, Role};
use skypanel_core::types::DbId;
use skypanel_core::work::{Shift, WorkStatus, CLAIMABLE};
use skypanel_core::CoreError;
use skypanel_gateway::{DataGateway, Direction, Predicate, ReadQuery};

use crate::collections;
use crate::model::{parse_row, parse_rows, WorkOrder};

/// Who is looking at the board.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub id: DbId,
    pub role: Role,
}

/// Outcome of trying to claim an order off the list.
#[derive(Debug, Clone, PartialEq)]
pub enum TakeOutcome {
    Taken,
    /// Someone else got there first (or the order left a claimable status).
    AlreadyTaken,
}

/// Aggregate counters for the dashboard header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkStats {
    pub pending: usize,
    /// Orders in HIGH_PRIORITY status or carrying the priority flag.
    pub high_priority: usize,
    pub in_progress: usize,
    pub paused: usize,
    pub completed: usize,
}

/// Fields for a new work order.
#[derive(Debug, Clone)]
pub struct NewWork {
    pub title: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub high_priority: bool,
    pub client_name: Option<String>,
    pub client_phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Read and mutate the shared work list on behalf of one viewer.
pub struct WorkBoard<G> {
    gateway: std::sync::Arc<G>,
    viewer: Viewer,
}

impl<G: DataGateway> WorkBoard<G> {
    pub fn new(gateway: std::sync::Arc<G>, viewer: Viewer) -> Self {
        Self { gateway, viewer }
    }

    fn require(&self, action: Action) -> Result<(), CoreError> {
        if can_access(self.viewer.role, action) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "{} may not perform this action",
                self.viewer.role.as_str()
            )))
        }
    }

    fn claimable_condition() -> Predicate {
        Predicate::In(
            "status".into(),
            CLAIMABLE.iter().map(|s| json!(s.as_str())).collect(),
        )
    }

    /// The shared list: non-archived, pinned first, then newest.
    pub async fn list(&self) -> Result<Vec<WorkOrder>, CoreError> {
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::WORKS)
                    .filter(Predicate::eq("archived", false))
                    .order_by("pinned", Direction::Desc)
                    .order_by("created_at", Direction::Desc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// Orders scheduled inside one calendar month.
    pub async fn month(&self, year: i32, month: u32) -> Result<Vec<WorkOrder>, CoreError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::Validation(format!("Invalid month {year}-{month:02}")))?;
        let last = last_day_of_month(first);

        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::WORKS)
                    .filter(Predicate::eq("archived", false))
                    .filter(Predicate::Gte("work_date".into(), json!(first.to_string())))
                    .filter(Predicate::Lte("work_date".into(), json!(last.to_string())))
                    .order_by("work_date", Direction::Asc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// Counters over the non-archived list.
    pub async fn stats(&self) -> Result<WorkStats, CoreError> {
        let works = self.list().await?;
        let mut stats = WorkStats::default();
        for work in &works {
            if work.priority || work.status == WorkStatus::HighPriority {
                stats.high_priority += 1;
            }
            match work.status {
                WorkStatus::Pending => stats.pending += 1,
                WorkStatus::HighPriority => {}
                WorkStatus::InProgress => stats.in_progress += 1,
                WorkStatus::Paused => stats.paused += 1,
                WorkStatus::Completed => stats.completed += 1,
            }
        }
        Ok(stats)
    }

    /// Claim a specific order off the list.
    pub async fn take(&self, work_id: DbId) -> Result<TakeOutcome, CoreError> {
        self.require(Action::ClaimWork)?;
        let now = Utc::now();
        let affected = self
            .gateway
            .update(
                collections::WORKS,
                work_id,
                json!({
                    "status": WorkStatus::InProgress.as_str(),
                    "assigned_technician_id": self.viewer.id,
                    "locked_by": self.viewer.id,
                    "locked_at": now,
                    "started_at": now,
                }),
                Some(Self::claimable_condition()),
            )
            .await
            .map_err(CoreError::from)?;

        if affected == 1 {
            tracing::info!(work_id, technician_id = self.viewer.id, "Work claimed");
            Ok(TakeOutcome::Taken)
        } else {
            tracing::info!(work_id, technician_id = self.viewer.id, "Claim lost");
            Ok(TakeOutcome::AlreadyTaken)
        }
    }

    /// Pause the order this viewer is working. Frees it for anyone to
    /// re-take later.
    pub async fn pause(&self, work_id: DbId, reason: Option<String>) -> Result<(), CoreError> {
        self.require(Action::PauseWork)?;
        let affected = self
            .gateway
            .update(
                collections::WORKS,
                work_id,
                json!({
                    "status": WorkStatus::Paused.as_str(),
                    "pause_reason": reason,
                    "locked_by": null,
                    "locked_at": null,
                }),
                Some(Predicate::eq("locked_by", self.viewer.id)),
            )
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::Conflict(format!(
                "Order {work_id} is not held by this technician"
            )));
        }
        Ok(())
    }

    /// Complete an order directly from the list, without chaining into the
    /// next assignment.
    pub async fn complete(&self, work_id: DbId) -> Result<(), CoreError> {
        self.require(Action::CompleteWork)?;
        let affected = self
            .gateway
            .update(
                collections::WORKS,
                work_id,
                json!({
                    "status": WorkStatus::Completed.as_str(),
                    "completed_at": Utc::now(),
                    "locked_by": null,
                    "locked_at": null,
                }),
                Some(Predicate::eq("locked_by", self.viewer.id)),
            )
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::Conflict(format!(
                "Order {work_id} is not held by this technician"
            )));
        }
        Ok(())
    }

    /// Pin or unpin an order at the top of the list.
    pub async fn set_pinned(&self, work_id: DbId, pinned: bool) -> Result<(), CoreError> {
        self.require(Action::PinWork)?;
        let affected = self
            .gateway
            .update(collections::WORKS, work_id, json!({"pinned": pinned}), None)
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "work order",
                id: work_id,
            });
        }
        Ok(())
    }

    /// Put an order on the calendar.
    pub async fn schedule(
        &self,
        work_id: DbId,
        date: NaiveDate,
        shift: Shift,
    ) -> Result<(), CoreError> {
        self.require(Action::ScheduleWork)?;
        let affected = self
            .gateway
            .update(
                collections::WORKS,
                work_id,
                json!({"work_date": date.to_string(), "shift": shift}),
                None,
            )
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "work order",
                id: work_id,
            });
        }
        Ok(())
    }

    /// Create a new order on the list.
    pub async fn create(&self, new: NewWork) -> Result<WorkOrder, CoreError> {
        self.require(Action::ScheduleWork)?;
        if new.title.trim().is_empty() {
            return Err(CoreError::Validation("Title is required".into()));
        }
        let status = if new.high_priority {
            WorkStatus::HighPriority
        } else {
            WorkStatus::Pending
        };

        let row = self
            .gateway
            .insert(
                collections::WORKS,
                json!({
                    "title": new.title,
                    "description": new.description,
                    "address": new.address,
                    "status": status.as_str(),
                    "priority": new.high_priority,
                    "pinned": false,
                    "archived": false,
                    "client_name": new.client_name,
                    "client_phone": new.client_phone,
                    "latitude": new.latitude,
                    "longitude": new.longitude,
                    "created_by": self.viewer.id,
                    "assigned_technician_id": null,
                    "partner_technician_id": null,
                    "locked_by": null,
                }),
            )
            .await
            .map_err(CoreError::from)?;
        parse_row(row)
    }

    /// Hide an order from the list without deleting it.
    pub async fn archive(&self, work_id: DbId) -> Result<(), CoreError> {
        self.require(Action::ScheduleWork)?;
        let affected = self
            .gateway
            .update(collections::WORKS, work_id, json!({"archived": true}), None)
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "work order",
                id: work_id,
            });
        }
        Ok(())
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    // First day of the following month, minus one day.
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.pred_opt().unwrap_or(first))
        .unwrap_or(first)
}
