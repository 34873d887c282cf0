//! Hazard reports.
//!
//! Anyone can report; only admins resolve. Resolution is a conditional
//! update on `resolved = false`, so resolving an already-resolved report
//! is a visible no-op rather than a silent double-write.

use serde_json::json;

use skypanel_core::hazard::Severity;
use skypanel_core::roles::{can_access, Action, Role};
use skypanel_core::types::DbId;
use skypanel_core::CoreError;
use skypanel_gateway::{DataGateway, Direction, Predicate, ReadQuery};

use crate::collections;
use crate::geo::{PositionSource, ReverseGeocoder};
use crate::model::{parse_row, parse_rows, HazardReport};

/// Fields for a new hazard report.
#[derive(Debug, Clone)]
pub struct NewHazard {
    pub description: String,
    pub severity: Severity,
    pub location_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub work_id: Option<DbId>,
}

impl NewHazard {
    pub fn new(description: impl Into<String>, severity: Severity) -> Self {
        Self {
            description: description.into(),
            severity,
            location_address: None,
            latitude: None,
            longitude: None,
            work_id: None,
        }
    }

    /// Attach the device's position and a best-effort address. Failure to
    /// obtain a position leaves the report unlocated rather than blocking it.
    pub async fn with_position(
        mut self,
        source: &dyn PositionSource,
        geocoder: &ReverseGeocoder,
    ) -> Self {
        match source.current().await {
            Ok(position) => {
                self.latitude = Some(position.latitude);
                self.longitude = Some(position.longitude);
                if self.location_address.is_none() {
                    self.location_address = Some(geocoder.describe(position).await);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "No position for hazard report");
            }
        }
        self
    }
}

/// Outcome of a resolve attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    /// Another admin resolved it first.
    AlreadyResolved,
}

pub struct HazardBoard<G> {
    gateway: std::sync::Arc<G>,
    viewer_id: DbId,
    viewer_role: Role,
}

impl<G: DataGateway> HazardBoard<G> {
    pub fn new(gateway: std::sync::Arc<G>, viewer_id: DbId, viewer_role: Role) -> Self {
        Self {
            gateway,
            viewer_id,
            viewer_role,
        }
    }

    /// All reports, newest first.
    pub async fn list(&self) -> Result<Vec<HazardReport>, CoreError> {
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::HAZARD_REPORTS)
                    .order_by("created_at", Direction::Desc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// Unresolved reports only, most severe handled by the caller's sort.
    pub async fn open(&self) -> Result<Vec<HazardReport>, CoreError> {
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::HAZARD_REPORTS)
                    .filter(Predicate::eq("resolved", false))
                    .order_by("created_at", Direction::Desc),
            )
            .await
            .map_err(CoreError::from)?;
        parse_rows(rows)
    }

    /// File a new report.
    pub async fn report(&self, new: NewHazard) -> Result<HazardReport, CoreError> {
        if !can_access(self.viewer_role, Action::ReportHazard) {
            return Err(CoreError::Forbidden("Reporting is not permitted".into()));
        }
        if new.description.trim().is_empty() {
            return Err(CoreError::Validation("Description is required".into()));
        }

        let row = self
            .gateway
            .insert(
                collections::HAZARD_REPORTS,
                json!({
                    "description": new.description,
                    "severity": new.severity,
                    "location_address": new.location_address,
                    "latitude": new.latitude,
                    "longitude": new.longitude,
                    "work_id": new.work_id,
                    "reported_by": self.viewer_id,
                    "resolved": false,
                    "resolved_by": null,
                    "resolved_at": null,
                }),
            )
            .await
            .map_err(CoreError::from)?;
        let report: HazardReport = parse_row(row)?;
        tracing::info!(
            hazard_id = report.id,
            severity = report.severity.as_str(),
            "Hazard reported",
        );
        Ok(report)
    }

    /// Mark a report resolved. Admin only; idempotent against races.
    pub async fn resolve(&self, hazard_id: DbId) -> Result<ResolveOutcome, CoreError> {
        if !can_access(self.viewer_role, Action::ResolveHazard) {
            return Err(CoreError::Forbidden("Only admins resolve hazards".into()));
        }

        let affected = self
            .gateway
            .update(
                collections::HAZARD_REPORTS,
                hazard_id,
                json!({
                    "resolved": true,
                    "resolved_by": self.viewer_id,
                    "resolved_at": chrono::Utc::now(),
                }),
                Some(Predicate::eq("resolved", false)),
            )
            .await
            .map_err(CoreError::from)?;
        if affected == 1 {
            return Ok(ResolveOutcome::Resolved);
        }

        // Zero rows: either already resolved, or no such report.
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::HAZARD_REPORTS)
                    .filter(Predicate::eq("id", hazard_id)),
            )
            .await
            .map_err(CoreError::from)?;
        if rows.is_empty() {
            Err(CoreError::NotFound {
                entity: "hazard report",
                id: hazard_id,
            })
        } else {
            Ok(ResolveOutcome::AlreadyResolved)
        }
    }
}
