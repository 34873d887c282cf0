//! Client configuration loaded from environment variables.

use std::path::PathBuf;

/// Connection and persistence settings.
///
/// All fields have defaults suitable for local development against the
/// in-memory platform double; point the URLs at a real deployment via the
/// environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Platform REST base URL.
    pub platform_url: String,
    /// Platform realtime WebSocket base URL.
    pub realtime_url: String,
    /// Anonymous API key presented on every request.
    pub api_key: String,
    /// Where the session file lives.
    pub session_path: PathBuf,
    /// Reverse-geocoding endpoint.
    pub geocoder_url: String,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                                       |
    /// |-----------------------|-----------------------------------------------|
    /// | `PLATFORM_URL`        | `http://localhost:54321`                      |
    /// | `REALTIME_URL`        | `ws://localhost:54321`                        |
    /// | `PLATFORM_API_KEY`    | (empty)                                       |
    /// | `SESSION_PATH`        | `.skypanel-session.json`                      |
    /// | `GEOCODER_URL`        | `https://nominatim.openstreetmap.org/reverse` |
    pub fn from_env() -> Self {
        let platform_url =
            std::env::var("PLATFORM_URL").unwrap_or_else(|_| "http://localhost:54321".into());
        let realtime_url =
            std::env::var("REALTIME_URL").unwrap_or_else(|_| "ws://localhost:54321".into());
        let api_key = std::env::var("PLATFORM_API_KEY").unwrap_or_default();
        let session_path = std::env::var("SESSION_PATH")
            .unwrap_or_else(|_| ".skypanel-session.json".into())
            .into();
        let geocoder_url = std::env::var("GEOCODER_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/reverse".into());

        Self {
            platform_url,
            realtime_url,
            api_key,
            session_path,
            geocoder_url,
        }
    }
}
