//! Skypanel data-access gateway.
//!
//! The hosted platform exposes three surfaces the client consumes:
//!
//! - generic reads/inserts/conditional-updates against named collections
//!   ([`DataGateway`]),
//! - three remote procedures that encapsulate the only non-trivial logic
//!   ([`PlatformProcedures`]): atomic login, atomic work assignment, and
//!   atomic complete-and-reassign,
//! - a realtime change stream ([`realtime`]) feeding the local
//!   [`ChangeFeed`](skypanel_events::ChangeFeed).
//!
//! [`RestGateway`] implements the first two over HTTP. [`MemoryGateway`]
//! is an in-memory double honoring the same contracts (including the
//! procedures' atomicity), used by tests and the demo binary.

pub mod error;
pub mod memory;
pub mod query;
pub mod realtime;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skypanel_core::roles::Role;
use skypanel_core::types::DbId;

pub use error::GatewayError;
pub use memory::MemoryGateway;
pub use query::{Direction, Predicate, ReadQuery, SortKey};
pub use rest::RestGateway;

/// A raw platform record. Collections are schemaless at this layer; the
/// client crate parses rows into typed models.
pub type Row = serde_json::Value;

// ---------------------------------------------------------------------------
// DataGateway
// ---------------------------------------------------------------------------

/// Generic query/mutation access to the platform's named collections.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Read rows matching the query, in the query's ordering.
    async fn read(&self, query: ReadQuery) -> Result<Vec<Row>, GatewayError>;

    /// Insert one record, returning it as stored (with id and defaults).
    async fn insert(&self, collection: &str, row: Row) -> Result<Row, GatewayError>;

    /// Patch the record with `id`, but only if `condition` still holds at
    /// write time. Returns the number of affected rows (0 or 1); zero means
    /// the condition no longer held — the caller decides whether that is a
    /// conflict or a no-op.
    async fn update(
        &self,
        collection: &str,
        id: DbId,
        patch: Row,
        condition: Option<Predicate>,
    ) -> Result<u64, GatewayError>;
}

// ---------------------------------------------------------------------------
// Remote procedures
// ---------------------------------------------------------------------------

/// Profile returned by a successful `login_with_username` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginSuccess {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    pub full_name: String,
    /// Opaque token; the client stores it verbatim and never inspects it.
    pub session_token: String,
}

/// Outcome of a login attempt. Rejection is a normal, inline-surfaced
/// result, not a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Success(LoginSuccess),
    Rejected(String),
}

/// The platform's remote procedures.
///
/// All three are atomic on the server; callers must treat them as
/// fire-and-confirm and re-derive state from reads afterwards.
#[async_trait]
pub trait PlatformProcedures: Send + Sync {
    /// Verify credentials and mint a session token.
    async fn login_with_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, GatewayError>;

    /// Assign the next eligible pending work order to `technician_id`.
    ///
    /// Returns the assigned work-order row, or `None` when nothing is
    /// pending. Eligibility and ordering are the server's contract; the
    /// client only displays what comes back.
    async fn assign_next_work(&self, technician_id: DbId) -> Result<Option<Row>, GatewayError>;

    /// Atomically mark `work_id` completed and try to assign the next
    /// eligible work order to the same technician in the same operation.
    async fn complete_and_get_next(
        &self,
        work_id: DbId,
        technician_id: DbId,
    ) -> Result<Option<Row>, GatewayError>;
}
