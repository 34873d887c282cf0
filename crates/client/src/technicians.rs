//! Technician roster management (admin panel).

use serde_json::json;

use skypanel_core::roles::{can_access, Action, Role};
use skypanel_core::types::DbId;
use skypanel_core::CoreError;
use skypanel_gateway::{DataGateway, Direction, Predicate, ReadQuery};

use crate::collections;
use crate::model::{parse_rows, User};

pub struct Roster<G> {
    gateway: std::sync::Arc<G>,
    viewer_role: Role,
}

impl<G: DataGateway> Roster<G> {
    pub fn new(gateway: std::sync::Arc<G>, viewer_role: Role) -> Self {
        Self {
            gateway,
            viewer_role,
        }
    }

    fn require_admin(&self) -> Result<(), CoreError> {
        if can_access(self.viewer_role, Action::ManageTechnicians) {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Roster is admin only".into()))
        }
    }

    /// All technician accounts, alphabetical by display name.
    pub async fn technicians(&self) -> Result<Vec<User>, CoreError> {
        self.require_admin()?;
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::USERS)
                    .filter(Predicate::eq("role", Role::Technician.as_str()))
                    .order_by("full_name", Direction::Asc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// Enable or bench an account. A benched technician's login is refused
    /// by the platform; their history stays intact.
    pub async fn set_active(&self, user_id: DbId, active: bool) -> Result<(), CoreError> {
        self.require_admin()?;
        let affected = self
            .gateway
            .update(collections::USERS, user_id, json!({"is_active": active}), None)
            .await
            .map_err(CoreError::from)?;
        if affected == 0 {
            return Err(CoreError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        tracing::info!(user_id, active, "Technician activation changed");
        Ok(())
    }
}
