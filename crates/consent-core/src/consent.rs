//! Consent state machine.
//!
//! `Pending → Accepted | Rejected`. Both outcomes are terminal; a new view
//! always starts a new `Consent` at `Pending`.

use crate::client::{ClientRecord, ReconciledGrant};
use crate::grant::ValidGrant;
use crate::scope::Scope;
use crate::session::{SessionError, SessionStore};

/// Where the browser is sent next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    location: String,
}

impl Navigation {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

/// The user's answer on the consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentDecision {
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentState {
    Pending,
    Accepted(Navigation),
    Rejected(Navigation),
}

#[derive(Debug)]
pub struct Consent {
    reconciled: ReconciledGrant,
    neutral_url: String,
    state: ConsentState,
}

impl Consent {
    /// `neutral_url` is where a rejection lands; nothing is forwarded there.
    pub fn new(reconciled: ReconciledGrant, neutral_url: impl Into<String>) -> Self {
        Self {
            reconciled,
            neutral_url: neutral_url.into(),
            state: ConsentState::Pending,
        }
    }

    pub fn state(&self) -> &ConsentState {
        &self.state
    }

    pub fn client(&self) -> &ClientRecord {
        self.reconciled.client()
    }

    pub fn grant(&self) -> &ValidGrant {
        self.reconciled.grant()
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.client().scopes()
    }

    fn decided(&self) -> Option<&Navigation> {
        match &self.state {
            ConsentState::Pending => None,
            ConsentState::Accepted(nav) | ConsentState::Rejected(nav) => Some(nav),
        }
    }

    /// Accept: redirect to the client's registered URI with the assertion.
    ///
    /// The session token is read here and nowhere else. Without a token the
    /// state stays `Pending` and the caller re-runs the gate.
    pub(crate) fn accept(&mut self, session: &dyn SessionStore) -> Result<Navigation, SessionError> {
        if let Some(nav) = self.decided() {
            return Ok(nav.clone());
        }

        let token = session.token().ok_or(SessionError::Missing)?;
        let nav = Navigation::to(assertion_redirect(&self.reconciled, &token));

        tracing::info!("Consent accepted for client {}", self.client().id);
        self.state = ConsentState::Accepted(nav.clone());
        Ok(nav)
    }

    /// Reject: back to the neutral page, no state or error forwarded.
    pub(crate) fn reject(&mut self) -> Navigation {
        if let Some(nav) = self.decided() {
            return nav.clone();
        }

        tracing::info!("Consent rejected for client {}", self.client().id);
        let nav = Navigation::to(self.neutral_url.clone());
        self.state = ConsentState::Rejected(nav.clone());
        nav
    }

    /// Apply the user's decision. Only the first decision counts; later
    /// calls return the same navigation.
    pub fn decide(
        &mut self,
        decision: ConsentDecision,
        session: &dyn SessionStore,
    ) -> Result<Navigation, SessionError> {
        if decision.accepted {
            self.accept(session)
        } else {
            Ok(self.reject())
        }
    }
}

/// `<redirect_uri>?response_type=..&client_id=..&redirect_uri=..&state=..&assertion=..`
///
/// The base is the client's registered URI, which reconciliation has already
/// proven equal to the one in the request.
fn assertion_redirect(reconciled: &ReconciledGrant, token: &str) -> String {
    let grant = reconciled.grant();
    let base = &reconciled.client().redirect_uri;
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(grant.query_pairs())
        .append_pair("assertion", token)
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}
