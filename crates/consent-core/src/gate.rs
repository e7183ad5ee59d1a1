//! Session gate: which view a caller sees.

use serde::{Deserialize, Serialize};

use crate::grant::{InvalidRequest, ValidGrant};
use crate::lookup::LookupState;

/// Sign-in/sign-up toggle. Pure UI state, nothing is sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthView {
    #[default]
    Signin,
    Signup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Grant parameters malformed or partial.
    InvalidRequest,
    SignIn,
    SignUp,
    /// Signed in without a grant: go to the landing page.
    Home,
    /// Client record still being fetched.
    Loading,
    Consent,
    /// Client lookup or reconciliation failed.
    ClientError,
}

/// Decide the view for a caller.
///
/// Rules, in priority order:
/// 1. invalid grant parameters → error, whatever the session
/// 2. no session → sign-in or sign-up (grant kept for after authentication)
/// 3. session, no grant → home
/// 4. session, grant → loading / consent / client error per the lookup
pub fn gate(
    has_session: bool,
    grant: &Result<Option<ValidGrant>, InvalidRequest>,
    lookup: &LookupState,
    auth_view: AuthView,
) -> View {
    let grant = match grant {
        Err(_) => return View::InvalidRequest,
        Ok(grant) => grant,
    };

    if !has_session {
        return match auth_view {
            AuthView::Signin => View::SignIn,
            AuthView::Signup => View::SignUp,
        };
    }

    if grant.is_none() {
        return View::Home;
    }

    match lookup {
        LookupState::Idle | LookupState::Loading => View::Loading,
        LookupState::Loaded(_) => View::Consent,
        LookupState::Failed(_) => View::ClientError,
    }
}
