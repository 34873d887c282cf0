//! Geographic coordinates.

use serde::{Deserialize, Serialize};

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Human-readable fallback used when reverse geocoding fails.
    pub fn display(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}
