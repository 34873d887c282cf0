//! Work-order status machine and scheduling enums.
//!
//! The hosted platform owns every transition; this module only encodes
//! which transitions are legal so the in-memory contract double can reject
//! bad writes and views can decide which actions to offer.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a work order.
///
/// Wire representation matches the platform's column values
/// (`"PENDING"`, `"HIGH_PRIORITY"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    Pending,
    HighPriority,
    InProgress,
    Paused,
    Completed,
}

impl WorkStatus {
    /// The platform column value for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Pending => "PENDING",
            WorkStatus::HighPriority => "HIGH_PRIORITY",
            WorkStatus::InProgress => "IN_PROGRESS",
            WorkStatus::Paused => "PAUSED",
            WorkStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statuses from which a technician may claim a work order.
pub const CLAIMABLE: [WorkStatus; 3] = [
    WorkStatus::Pending,
    WorkStatus::HighPriority,
    WorkStatus::Paused,
];

/// Shift within a work day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shift {
    Morning,
    Afternoon,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Returns the set of valid target statuses reachable from `from`.
///
/// `Completed` is terminal and returns an empty slice.
pub fn valid_transitions(from: WorkStatus) -> &'static [WorkStatus] {
    match from {
        WorkStatus::Pending => &[WorkStatus::InProgress],
        WorkStatus::HighPriority => &[WorkStatus::InProgress],
        WorkStatus::Paused => &[WorkStatus::InProgress],
        WorkStatus::InProgress => &[WorkStatus::Paused, WorkStatus::Completed],
        WorkStatus::Completed => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: WorkStatus, to: WorkStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a transition, returning a descriptive message for invalid ones.
pub fn validate_transition(from: WorkStatus, to: WorkStatus) -> Result<(), String> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(format!("Invalid transition: {from} -> {to}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Valid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn pending_to_in_progress() {
        assert!(can_transition(WorkStatus::Pending, WorkStatus::InProgress));
    }

    #[test]
    fn high_priority_to_in_progress() {
        assert!(can_transition(
            WorkStatus::HighPriority,
            WorkStatus::InProgress
        ));
    }

    #[test]
    fn paused_to_in_progress() {
        assert!(can_transition(WorkStatus::Paused, WorkStatus::InProgress));
    }

    #[test]
    fn in_progress_to_paused() {
        assert!(can_transition(WorkStatus::InProgress, WorkStatus::Paused));
    }

    #[test]
    fn in_progress_to_completed() {
        assert!(can_transition(WorkStatus::InProgress, WorkStatus::Completed));
    }

    // -----------------------------------------------------------------------
    // Invalid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn completed_is_terminal() {
        assert!(valid_transitions(WorkStatus::Completed).is_empty());
    }

    #[test]
    fn pending_to_completed_invalid() {
        assert!(!can_transition(WorkStatus::Pending, WorkStatus::Completed));
    }

    #[test]
    fn paused_to_completed_invalid() {
        assert!(!can_transition(WorkStatus::Paused, WorkStatus::Completed));
    }

    #[test]
    fn validate_transition_err_names_both_states() {
        let err = validate_transition(WorkStatus::Completed, WorkStatus::Pending).unwrap_err();
        assert!(err.contains("COMPLETED"));
        assert!(err.contains("PENDING"));
    }

    // -----------------------------------------------------------------------
    // Wire names
    // -----------------------------------------------------------------------

    #[test]
    fn serde_uses_platform_column_values() {
        let json = serde_json::to_value(WorkStatus::HighPriority).unwrap();
        assert_eq!(json, serde_json::json!("HIGH_PRIORITY"));

        let parsed: WorkStatus = serde_json::from_value(serde_json::json!("IN_PROGRESS")).unwrap();
        assert_eq!(parsed, WorkStatus::InProgress);
    }

    #[test]
    fn claimable_excludes_in_progress_and_completed() {
        assert!(!CLAIMABLE.contains(&WorkStatus::InProgress));
        assert!(!CLAIMABLE.contains(&WorkStatus::Completed));
    }

    #[test]
    fn shift_serde_round_trip() {
        let json = serde_json::to_value(Shift::Morning).unwrap();
        assert_eq!(json, serde_json::json!("MORNING"));
    }
}
