//! One authorize view, end to end.
//!
//! `AuthorizeFlow` strings the validator, gate, client lookup and consent
//! state machine together for a single page view. It owns no state between
//! views; each call builds a fresh `ClientLookup` and `Consent`.

use crate::client::{ClientDirectory, ReconcileError, fetch_and_reconcile};
use crate::consent::{Consent, ConsentDecision, Navigation};
use crate::gate::{AuthView, View, gate};
use crate::grant::{GrantRequest, InvalidRequest, ValidGrant, validate};
use crate::lookup::{ClientLookup, LookupState};
use crate::session::{
    AuthError, AuthOutcome, Credentials, IdentityProvider, SessionError, SessionStore,
};

/// A page to render.
#[derive(Debug)]
pub enum Screen {
    InvalidRequest(InvalidRequest),
    ClientError(ReconcileError),
    /// Sign-in form; `grant` is replayed after authentication.
    SignIn { grant: Option<ValidGrant> },
    SignUp { grant: Option<ValidGrant> },
    Consent(Consent),
}

/// What the portal should do with the request.
#[derive(Debug)]
pub enum Step {
    Render(Screen),
    Redirect(Navigation),
}

pub struct AuthorizeFlow<'a> {
    directory: &'a dyn ClientDirectory,
    identity: &'a dyn IdentityProvider,
    landing_url: &'a str,
}

impl<'a> AuthorizeFlow<'a> {
    pub fn new(
        directory: &'a dyn ClientDirectory,
        identity: &'a dyn IdentityProvider,
        landing_url: &'a str,
    ) -> Self {
        Self {
            directory,
            identity,
            landing_url,
        }
    }

    /// Resolve the view for an inbound authorize request.
    pub async fn open(
        &self,
        request: &GrantRequest,
        session: &mut dyn SessionStore,
        auth_view: AuthView,
    ) -> Step {
        let validated = validate(request);
        let mut lookup = ClientLookup::new();
        let mut session_verified = false;

        loop {
            match gate(session.has_session(), &validated, lookup.state(), auth_view) {
                View::InvalidRequest => {
                    let Err(e) = validated else { unreachable!("gate only errors on Err") };
                    tracing::info!("Refusing authorization request: {}", e.reason());
                    return Step::Render(Screen::InvalidRequest(e));
                }
                View::SignIn => {
                    return Step::Render(Screen::SignIn {
                        grant: validated.ok().flatten(),
                    });
                }
                View::SignUp => {
                    return Step::Render(Screen::SignUp {
                        grant: validated.ok().flatten(),
                    });
                }
                View::Home => return Step::Redirect(Navigation::to(self.landing_url)),
                View::Loading => {
                    let Ok(Some(grant)) = &validated else {
                        unreachable!("gate only loads with a valid grant")
                    };
                    let Some(ticket) = lookup.begin(grant.client_id()) else {
                        // Already resolved for this id; a second fetch is never issued.
                        tracing::warn!("Client lookup for {} did not settle", grant.client_id());
                        return Step::Render(Screen::ClientError(ReconcileError::Unreachable));
                    };
                    let result = fetch_and_reconcile(self.directory, grant).await;
                    lookup.complete(ticket, result);
                }
                View::ClientError => {
                    let LookupState::Failed(e) = lookup.state() else {
                        unreachable!("gate only reports client errors on failure")
                    };
                    tracing::info!("Client verification failed: {}", e.reason());
                    return Step::Render(Screen::ClientError(e.clone()));
                }
                View::Consent => {
                    if !session_verified {
                        session_verified = true;
                        if !self.session_still_valid(session).await {
                            continue;
                        }
                    }
                    let LookupState::Loaded(reconciled) = lookup.state() else {
                        unreachable!("gate only shows consent once loaded")
                    };
                    return Step::Render(Screen::Consent(Consent::new(
                        reconciled.clone(),
                        self.landing_url,
                    )));
                }
            }
        }
    }

    /// Check the session with the identity provider, clearing it when
    /// rejected. An unreachable server leaves the session alone; the
    /// assertion is checked again by the server when it is redeemed.
    async fn session_still_valid(&self, session: &mut dyn SessionStore) -> bool {
        let Some(token) = session.token() else {
            return false;
        };
        match self.identity.verify_session(&token).await {
            Ok(()) => true,
            Err(SessionError::Unreachable) => {
                tracing::warn!("Could not verify session, continuing to consent");
                true
            }
            Err(e) => {
                tracing::debug!("Clearing session: {}", e);
                session.clear();
                false
            }
        }
    }

    /// Handle the consent form.
    ///
    /// Rejection needs nothing but the neutral page. Acceptance re-runs the
    /// whole gate so a tampered or stale form can never reach the redirect.
    pub async fn decide(
        &self,
        request: &GrantRequest,
        session: &mut dyn SessionStore,
        decision: ConsentDecision,
    ) -> Step {
        if !decision.accepted {
            tracing::info!("Consent rejected");
            return Step::Redirect(Navigation::to(self.landing_url));
        }

        match self.open(request, session, AuthView::Signin).await {
            Step::Render(Screen::Consent(mut consent)) => match consent.decide(decision, session) {
                Ok(nav) => Step::Redirect(nav),
                Err(e) => {
                    tracing::debug!("Session lost before consent: {}", e);
                    session.clear();
                    self.open(request, session, AuthView::Signin).await
                }
            },
            other => other,
        }
    }

    /// Run local checks, then call the identity provider. The result is only
    /// reported; the caller decides where to store the token.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        email_domain: Option<&str>,
    ) -> Result<AuthOutcome, AuthError> {
        credentials.check(email_domain)?;
        let outcome = self.identity.authenticate(credentials).await;
        if let Err(e) = &outcome {
            tracing::debug!("Authentication failed: {}", e);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientRecord, test_client};
    use crate::grant::{ResponseType, request};
    use crate::session::SignIn;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Directory {
        record: Result<ClientRecord, ReconcileError>,
        calls: AtomicUsize,
    }

    impl Directory {
        fn returning(record: Result<ClientRecord, ReconcileError>) -> Self {
            Self {
                record,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ClientDirectory for Directory {
        async fn fetch_client(&self, _client_id: &str) -> Result<ClientRecord, ReconcileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.record.clone()
        }
    }

    struct Identity {
        session: Result<(), SessionError>,
        seen: Mutex<Vec<Credentials>>,
    }

    impl Identity {
        fn accepting() -> Self {
            Self {
                session: Ok(()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn rejecting_sessions() -> Self {
            Self {
                session: Err(SessionError::Rejected),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for Identity {
        async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
            self.seen.lock().unwrap().push(credentials.clone());
            Ok(AuthOutcome::Authenticated {
                token: "T".into(),
            })
        }

        async fn verify_session(&self, _token: &str) -> Result<(), SessionError> {
            self.session
        }
    }

    #[derive(Default)]
    struct Cookie(Option<String>);

    impl SessionStore for Cookie {
        fn token(&self) -> Option<String> {
            self.0.clone()
        }

        fn clear(&mut self) {
            self.0 = None;
        }
    }

    fn grant_request() -> GrantRequest {
        request(Some("code"), Some("c1"), Some("https://cb"), Some("xyz"))
    }

    fn good_directory() -> Directory {
        Directory::returning(Ok(test_client("c1", "https://cb", ResponseType::Code)))
    }

    #[tokio::test]
    async fn test_no_session_no_grant_shows_sign_in() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow.open(&GrantRequest::default(), &mut Cookie(None), AuthView::Signin).await;
        assert!(matches!(step, Step::Render(Screen::SignIn { grant: None })));
        assert_eq!(dir.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_no_grant_redirects_home() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow
            .open(&GrantRequest::default(), &mut Cookie(Some("T".into())), AuthView::Signin)
            .await;
        assert!(matches!(step, Step::Redirect(nav) if nav.location() == "/account"));
    }

    #[tokio::test]
    async fn test_invalid_grant_never_fetches() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let partial = request(Some("code"), Some("c1"), None, None);
        let step = flow.open(&partial, &mut Cookie(Some("T".into())), AuthView::Signin).await;
        assert!(matches!(
            step,
            Step::Render(Screen::InvalidRequest(InvalidRequest::MissingParams))
        ));
        assert_eq!(dir.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_session_with_grant_keeps_grant_for_sign_in() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow.open(&grant_request(), &mut Cookie(None), AuthView::Signup).await;
        match step {
            Step::Render(Screen::SignUp { grant: Some(grant) }) => {
                assert_eq!(GrantRequest::from(&grant), grant_request());
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_with_grant_shows_consent_after_one_fetch() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow.open(&grant_request(), &mut Cookie(Some("T".into())), AuthView::Signin).await;
        match step {
            Step::Render(Screen::Consent(consent)) => assert_eq!(consent.client().id, "c1"),
            other => panic!("unexpected step: {other:?}"),
        }
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mismatched_client_shows_client_error() {
        let dir = Directory::returning(Ok(test_client("c1", "https://cb/", ResponseType::Code)));
        let id = Identity::accepting();
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow.open(&grant_request(), &mut Cookie(Some("T".into())), AuthView::Signin).await;
        assert!(matches!(
            step,
            Step::Render(Screen::ClientError(ReconcileError::MismatchRedirectUri))
        ));
    }

    #[tokio::test]
    async fn test_rejected_session_is_cleared_and_regated() {
        let (dir, id) = (good_directory(), Identity::rejecting_sessions());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let mut cookie = Cookie(Some("expired".into()));
        let step = flow.open(&grant_request(), &mut cookie, AuthView::Signin).await;
        assert!(matches!(step, Step::Render(Screen::SignIn { grant: Some(_) })));
        assert_eq!(cookie.0, None);
    }

    #[tokio::test]
    async fn test_unreachable_session_check_still_consents() {
        let dir = good_directory();
        let id = Identity {
            session: Err(SessionError::Unreachable),
            seen: Mutex::new(Vec::new()),
        };
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let mut cookie = Cookie(Some("T".into()));
        let step = flow.open(&grant_request(), &mut cookie, AuthView::Signin).await;
        assert!(matches!(step, Step::Render(Screen::Consent(_))));
        assert_eq!(cookie.0.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_accept_redirects_with_assertion() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let step = flow
            .decide(
                &grant_request(),
                &mut Cookie(Some("T".into())),
                ConsentDecision { accepted: true },
            )
            .await;
        match step {
            Step::Redirect(nav) => assert_eq!(
                nav.location(),
                "https://cb?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fcb&state=xyz&assertion=T"
            ),
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_accept_with_tampered_grant_is_refused() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let tampered = request(Some("code"), Some("c1"), Some("https://evil"), Some("xyz"));
        let step = flow
            .decide(&tampered, &mut Cookie(Some("T".into())), ConsentDecision { accepted: true })
            .await;
        assert!(matches!(
            step,
            Step::Render(Screen::ClientError(ReconcileError::MismatchRedirectUri))
        ));
    }

    #[tokio::test]
    async fn test_reject_twice_makes_no_calls() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let mut cookie = Cookie(Some("T".into()));
        let mut locations = Vec::new();
        for _ in 0..2 {
            match flow
                .decide(&grant_request(), &mut cookie, ConsentDecision { accepted: false })
                .await
            {
                Step::Redirect(nav) => locations.push(nav.location().to_string()),
                other => panic!("unexpected step: {other:?}"),
            }
        }
        assert_eq!(locations, vec!["/account", "/account"]);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authenticate_checks_locally_first() {
        let (dir, id) = (good_directory(), Identity::accepting());
        let flow = AuthorizeFlow::new(&dir, &id, "/account");
        let creds = Credentials::SignIn(SignIn {
            email: "gator@gmail.com".into(),
            password: "pw".into(),
        });
        let result = flow.authenticate(&creds, Some("ufl.edu")).await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
        assert!(id.seen.lock().unwrap().is_empty());

        let result = flow.authenticate(&creds, None).await;
        assert_eq!(result, Ok(AuthOutcome::Authenticated { token: "T".into() }));
    }
}
