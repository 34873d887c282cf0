//! Roles and the capability table.
//!
//! Authorization is ultimately enforced by the platform; `can_access` is the
//! single place views consult to decide which actions to offer, instead of
//! scattering role conditionals per view.

use serde::{Deserialize, Serialize};

/// Account role. Wire representation matches the platform's `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Technician,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Technician => "TECHNICIAN",
            Role::Admin => "ADMIN",
        }
    }
}

/// Every user-facing action that is gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewWorks,
    ClaimWork,
    PauseWork,
    CompleteWork,
    ScheduleWork,
    PinWork,
    ReportHazard,
    ResolveHazard,
    SendChatMessage,
    MonitorFleet,
    ManageTechnicians,
}

/// Capability check: may `role` perform `action`?
pub fn can_access(role: Role, action: Action) -> bool {
    match action {
        // Available to every authenticated user.
        Action::ViewWorks
        | Action::ClaimWork
        | Action::PauseWork
        | Action::CompleteWork
        | Action::ReportHazard
        | Action::SendChatMessage => true,

        // Admin-only.
        Action::ScheduleWork
        | Action::PinWork
        | Action::ResolveHazard
        | Action::MonitorFleet
        | Action::ManageTechnicians => role == Role::Admin,
    }
}
