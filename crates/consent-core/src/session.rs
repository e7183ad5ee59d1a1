//! Session and authentication collaborators.
//!
//! The session token is opaque: it is checked for presence and handed to
//! collaborators, never parsed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access to the caller's session token (a cookie in the portal).
pub trait SessionStore: Send {
    fn token(&self) -> Option<String>;

    /// Forget the token. Called when a collaborator rejects it.
    fn clear(&mut self);

    fn has_session(&self) -> bool {
        self.token().is_some()
    }
}

/// Stale or missing session discovered mid-flow.
///
/// Never shown to the user: the session is cleared and the gate re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No session token present")]
    Missing,
    #[error("Session token was rejected by the authorization server")]
    Rejected,
    #[error("Session could not be verified: authorization server unreachable")]
    Unreachable,
}

/// Sign-in/sign-up failure. Recoverable: the form is shown again with the
/// reason next to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Reason reported by the authorization server, displayed verbatim.
    #[error("{0}")]
    Rejected(String),
    /// Form input refused before any network call.
    #[error("{0}")]
    InvalidInput(String),
    #[error("Server could not be reached. Please try again later")]
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUp {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    /// Repeated password, compared locally and never sent.
    #[serde(skip_serializing)]
    pub password_confirmation: String,
    #[serde(default)]
    pub captcha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    SignIn(SignIn),
    SignUp(SignUp),
}

impl Credentials {
    /// Local checks run before the credentials leave the portal.
    ///
    /// `email_domain` restricts accepted addresses (e.g. `ufl.edu`).
    pub fn check(&self, email_domain: Option<&str>) -> Result<(), AuthError> {
        match self {
            Credentials::SignIn(s) => {
                check_email(&s.email, email_domain)?;
                if s.password.is_empty() {
                    return Err(AuthError::InvalidInput("Password is required".into()));
                }
            }
            Credentials::SignUp(s) => {
                if s.first_name.trim().is_empty() || s.last_name.trim().is_empty() {
                    return Err(AuthError::InvalidInput(
                        "First and last name are required".into(),
                    ));
                }
                check_email(&s.email, email_domain)?;
                if s.password.is_empty() {
                    return Err(AuthError::InvalidInput("Password is required".into()));
                }
                if s.password != s.password_confirmation {
                    return Err(AuthError::InvalidInput("Passwords do not match".into()));
                }
            }
        }
        Ok(())
    }
}

fn check_email(email: &str, domain: Option<&str>) -> Result<(), AuthError> {
    let invalid = || match domain {
        Some(d) => AuthError::InvalidInput(format!("Email address must be a valid @{d} address")),
        None => AuthError::InvalidInput("Email address is invalid".into()),
    };

    let (local, host) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || host.is_empty() || host.contains('@') || local.contains(char::is_whitespace) {
        return Err(invalid());
    }
    if let Some(d) = domain {
        if !host.eq_ignore_ascii_case(d) {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Result of a successful authentication call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Signed in; store the token as the session.
    Authenticated { token: String },
    /// Account created, but the email address must be verified first.
    VerificationPending { message: String },
}

/// The authorization server's authentication endpoints.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError>;

    /// Ask the server whether `token` is still a valid session.
    async fn verify_session(&self, token: &str) -> Result<(), SessionError>;
}
