//! Shared fixtures for integration tests.

use std::sync::Arc;

use serde_json::{json, Value};
use skypanel_core::types::DbId;
use skypanel_gateway::MemoryGateway;

pub const TECNICO1: DbId = 1;
pub const TECNICO2: DbId = 2;
pub const ADMIN: DbId = 3;

/// A platform double with two technicians and one admin signed up.
pub async fn platform() -> Arc<MemoryGateway> {
    let gateway = Arc::new(MemoryGateway::new());
    for (id, username, full_name, role) in [
        (TECNICO1, "tecnico1", "Tech One", "TECHNICIAN"),
        (TECNICO2, "tecnico2", "Tech Two", "TECHNICIAN"),
        (ADMIN, "admin", "The Admin", "ADMIN"),
    ] {
        gateway
            .seed(
                "users",
                json!({
                    "id": id,
                    "username": username,
                    "password": "pw",
                    "full_name": full_name,
                    "role": role,
                    "is_active": true,
                }),
            )
            .await;
    }
    gateway
}

/// A minimal pending work-order row.
pub fn work(id: DbId, status: &str, created_at: &str) -> Value {
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
