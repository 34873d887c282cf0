use crate::types::DbId;

/// Domain error taxonomy for the client.
///
/// `NotFound` describes a missing record that was addressed by id; an empty
/// query result is a normal state and is modelled as `Option`/empty `Vec`,
/// never as an error. `Conflict` covers conditional updates that affected
/// zero rows (e.g. a work order claimed by someone else first).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
