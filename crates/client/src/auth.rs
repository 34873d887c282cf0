//! Sign-in and sign-out flows.

use validator::Validate;

use skypanel_core::CoreError;
use skypanel_gateway::{LoginOutcome, PlatformProcedures};

use crate::session::{SessionStore, StoredSession};

/// Credentials as entered on the login form.
#[derive(Debug, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Outcome of a sign-in attempt. A rejection is ordinary feedback for the
/// user, not an error.
#[derive(Debug, PartialEq)]
pub enum SignIn {
    SignedIn(StoredSession),
    Rejected(String),
}

/// Runs the login procedure and keeps the session file in sync.
pub struct Authenticator<'a, P> {
    procedures: &'a P,
    store: &'a SessionStore,
}

impl<'a, P: PlatformProcedures> Authenticator<'a, P> {
    pub fn new(procedures: &'a P, store: &'a SessionStore) -> Self {
        Self { procedures, store }
    }

    /// Validate the form, call the platform, persist on success.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<SignIn, CoreError> {
        if let Err(errors) = credentials.validate() {
            return Err(CoreError::Validation(errors.to_string()));
        }

        let outcome = self
            .procedures
            .login_with_username(&credentials.username, &credentials.password)
            .await
            .map_err(CoreError::from)?;

        match outcome {
            LoginOutcome::Success(profile) => {
                let session = StoredSession::from(profile);
                self.store.save(&session)?;
                tracing::info!(user_id = session.user_id, username = %session.username, "Signed in");
                Ok(SignIn::SignedIn(session))
            }
            LoginOutcome::Rejected(reason) => {
                tracing::info!(username = %credentials.username, "Sign-in rejected");
                Ok(SignIn::Rejected(reason))
            }
        }
    }

    /// Resume from the session file, if one parses.
    pub fn resume(&self) -> Option<StoredSession> {
        self.store.load()
    }

    /// Drop the local session. The platform's token lifecycle is its own.
    pub fn sign_out(&self) {
        self.store.clear();
    }
}
