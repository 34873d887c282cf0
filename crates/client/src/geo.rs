//! Position lookup and reverse geocoding.
//!
//! The address shown next to a position is a convenience, not a
//! requirement: when the geocoder is unreachable or returns nothing the
//! raw coordinates are displayed instead, and no error surfaces.

use async_trait::async_trait;
use serde::Deserialize;

use skypanel_core::geo::Coordinates;

/// Why the device could not produce a position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    Unavailable,
    #[error("Position request timed out")]
    Timeout,
}

/// Where the device thinks it is. Implemented by the platform shell; tests
/// use a fixed stub.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current(&self) -> Result<Coordinates, PositionError>;
}

/// A source pinned to one position. Useful in tests and demos.
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current(&self) -> Result<Coordinates, PositionError> {
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Turns coordinates into a human-readable place name.
pub struct ReverseGeocoder {
    http: reqwest::Client,
    endpoint: String,
}

impl ReverseGeocoder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Best-effort description of a position. Falls back to the formatted
    /// coordinates on any failure.
    pub async fn describe(&self, position: Coordinates) -> String {
        match self.lookup(position).await {
            Ok(Some(name)) => name,
            Ok(None) => position.display(),
            Err(e) => {
                tracing::debug!(error = %e, "Reverse geocoding failed, using raw coordinates");
                position.display()
            }
        }
    }

    async fn lookup(&self, position: Coordinates) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("lat", position.latitude.to_string()),
                ("lon", position.longitude.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: ReverseResponse = response.json().await?;
        Ok(body.display_name)
    }
}
