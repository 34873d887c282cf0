//! Typed views over platform rows.
//!
//! Collections are schemaless at the gateway layer; this module gives the
//! client typed models with tolerant decoding. Every optional column is
//! `Option` with a serde default, so rows written by older deployments
//! still parse.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use skypanel_core::hazard::Severity;
use skypanel_core::roles::Role;
use skypanel_core::types::{DbId, Timestamp};
use skypanel_core::work::{Shift, WorkStatus};
use skypanel_core::CoreError;
use skypanel_gateway::Row;

/// A work order as stored in the `works` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: DbId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub status: WorkStatus,
    /// Urgency flag set at creation. Independent of the HIGH_PRIORITY
    /// status: a priority order keeps the flag through its whole lifecycle.
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub work_date: Option<NaiveDate>,
    #[serde(default)]
    pub shift: Option<Shift>,
    #[serde(default)]
    pub assigned_technician_id: Option<DbId>,
    #[serde(default)]
    pub partner_technician_id: Option<DbId>,
    #[serde(default)]
    pub locked_by: Option<DbId>,
    #[serde(default)]
    pub locked_at: Option<Timestamp>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
    #[serde(default)]
    pub pause_reason: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub created_by: Option<DbId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl WorkOrder {
    /// Is `technician` the assignee or the partner on this order?
    pub fn involves(&self, technician: DbId) -> bool {
        self.assigned_technician_id == Some(technician)
            || self.partner_technician_id == Some(technician)
    }

    /// May this order be moved straight into progress?
    pub fn claimable(&self) -> bool {
        skypanel_core::work::can_transition(self.status, WorkStatus::InProgress)
    }
}

/// A user account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub specialties: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A hazard report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardReport {
    pub id: DbId,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub work_id: Option<DbId>,
    pub reported_by: DbId,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_by: Option<DbId>,
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// A chat message row, with author fields filled in by a follow-up read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: DbId,
    pub user_id: DbId,
    pub message: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// One row of the fleet monitor view: a technician with their current
/// workload counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianStatus {
    pub technician_id: DbId,
    pub full_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub current_work_id: Option<DbId>,
    #[serde(default)]
    pub current_work_title: Option<String>,
    #[serde(default)]
    pub works_in_progress: u32,
    #[serde(default)]
    pub works_completed_today: u32,
}

/// Decode a raw row into a typed model.
pub fn parse_row<T: serde::de::DeserializeOwned>(row: Row) -> Result<T, CoreError> {
    serde_json::from_value(row).map_err(|e| CoreError::Internal(format!("Row decode failed: {e}")))
}

/// Decode a batch of rows, failing on the first undecodable one.
pub fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, CoreError> {
    rows.into_iter().map(parse_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_work_row_parses() {
        let work: WorkOrder = parse_row(json!({
            "id": 42,
            "title": "Panel inspection",
            "status": "PENDING",
        }))
        .unwrap();
        assert_eq!(work.id, 42);
        assert_eq!(work.status, WorkStatus::Pending);
        assert!(!work.priority);
        assert!(!work.pinned);
        assert!(work.assigned_technician_id.is_none());
    }

    #[test]
    fn full_work_row_parses() {
        let work: WorkOrder = parse_row(json!({
            "id": 42,
            "title": "Panel inspection",
            "status": "IN_PROGRESS",
            "pinned": true,
            "archived": false,
            "work_date": "2026-03-15",
            "shift": "MORNING",
            "assigned_technician_id": 7,
            "partner_technician_id": null,
            "locked_by": 7,
            "started_at": "2026-03-15T08:00:00Z",
            "latitude": 45.464211,
            "longitude": 9.191383,
        }))
        .unwrap();
        assert_eq!(work.shift, Some(Shift::Morning));
        assert!(work.involves(7));
        assert!(!work.involves(8));
    }

    #[test]
    fn partner_counts_as_involved() {
        let work: WorkOrder = parse_row(json!({
            "id": 1,
            "title": "T",
            "status": "IN_PROGRESS",
            "assigned_technician_id": 3,
            "partner_technician_id": 7,
        }))
        .unwrap();
        assert!(work.involves(7));
    }

    #[test]
    fn bad_status_is_a_decode_error() {
        let result: Result<WorkOrder, _> = parse_row(json!({
            "id": 1,
            "title": "T",
            "status": "EXPLODED",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn claimable_follows_the_status_machine() {
        let mut work: WorkOrder = parse_row(json!({
            "id": 1,
            "title": "T",
            "status": "PAUSED",
        }))
        .unwrap();
        assert!(work.claimable());
        work.status = WorkStatus::Completed;
        assert!(!work.claimable());
    }

    #[test]
    fn user_is_active_defaults_to_true() {
        let user: User = parse_row(json!({
            "id": 1,
            "username": "tecnico1",
            "full_name": "Tech One",
            "role": "TECHNICIAN",
        }))
        .unwrap();
        assert!(user.is_active);
    }

    #[test]
    fn hazard_row_parses() {
        let hazard: HazardReport = parse_row(json!({
            "id": 5,
            "description": "Exposed wiring near the inverter",
            "severity": "CRITICAL",
            "reported_by": 7,
            "resolved": false,
        }))
        .unwrap();
        assert_eq!(hazard.severity, Severity::Critical);
        assert!(hazard.resolved_by.is_none());
    }
}
