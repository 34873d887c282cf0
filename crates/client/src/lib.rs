//! Skypanel field-service client.
//!
//! The client drives a technician's day against the hosted platform:
//! sign in, work the current order, browse and claim from the shared
//! list, report hazards, chat with the team, and (for admins) manage the
//! roster and watch the fleet. All state is re-derived from platform
//! reads; change notifications only say when to re-read.

pub mod auth;
pub mod chat;
pub mod config;
pub mod geo;
pub mod hazards;
pub mod lifecycle;
pub mod model;
pub mod monitor;
pub mod session;
pub mod technicians;
pub mod works;

pub use auth::{Authenticator, Credentials, SignIn};
pub use config::ClientConfig;
pub use lifecycle::{CompleteOutcome, LifecycleClient, RequestOutcome, WorkState};
pub use session::{SessionStore, StoredSession};
pub use works::{TakeOutcome, Viewer, WorkBoard};

/// Collection names as the platform exposes them.
pub mod collections {
    pub const WORKS: &str = "works";
    pub const USERS: &str = "users";
    pub const HAZARD_REPORTS: &str = "hazard_reports";
    pub const CHAT_MESSAGES: &str = "chat_messages";
    pub const TECHNICIAN_STATUS: &str = "technician_status_view";
}
