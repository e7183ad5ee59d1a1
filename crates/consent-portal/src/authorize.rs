//! Authorization page endpoints
//!
//! `GET /authorize` runs the session gate and renders the resulting view.
//! The sign-in, sign-up and consent forms post back here with the grant in
//! hidden fields; every post re-validates it before acting.

use std::sync::Arc;

use axum::{
    Form,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use consent_core::{
    AuthError, AuthOutcome, AuthView, ConsentDecision, Credentials, GrantRequest, InvalidRequest,
    ReconcileError, Screen, SignIn, SignUp, Step, ValidGrant, validate,
};
use serde::Deserialize;

use crate::AppState;
use crate::html;
use crate::session::{CookieSession, removal_cookie, session_cookie};

/// Grant parameters and sign-in/sign-up toggle from the raw
/// `GET /authorize` query.
///
/// A repeated grant parameter is ambiguous and refused as a malformed
/// request. An unknown `view` falls back to sign-in.
pub fn parse_authorize_query(query: Option<&str>) -> Result<(GrantRequest, AuthView), InvalidRequest> {
    let mut grant = GrantRequest::default();
    let mut view = AuthView::default();

    for (name, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let slot = match name.as_ref() {
            "response_type" => &mut grant.response_type,
            "client_id" => &mut grant.client_id,
            "redirect_uri" => &mut grant.redirect_uri,
            "state" => &mut grant.state,
            "view" => {
                view = match value.as_ref() {
                    "signup" => AuthView::Signup,
                    _ => AuthView::Signin,
                };
                continue;
            }
            _ => continue,
        };
        if slot.replace(value.into_owned()).is_some() {
            tracing::info!("Refusing authorization request: repeated parameter {}", name);
            return Err(InvalidRequest::MissingParams);
        }
    }

    Ok((grant, view))
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(default)]
    pub captcha: Option<String>,
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    pub decision: Decision,
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
}

macro_rules! grant_fields {
    ($form:ident) => {
        GrantRequest {
            response_type: $form.response_type.clone(),
            client_id: $form.client_id.clone(),
            redirect_uri: $form.redirect_uri.clone(),
            state: $form.state.clone(),
        }
    };
}

/// Handler for `GET /authorize`
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let (grant, view) = match parse_authorize_query(query.as_deref()) {
        Ok(parsed) => parsed,
        Err(e) => return (StatusCode::BAD_REQUEST, Html(html::invalid_request_page(e))).into_response(),
    };

    let mut session = CookieSession::from_headers(&headers, &state.config.session);
    let step = state.flow().open(&grant, &mut session, view).await;
    respond(&state, step, &session)
}

/// Handler for `POST /authorize/consent`
pub async fn consent_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Response {
    let mut session = CookieSession::from_headers(&headers, &state.config.session);
    let decision = ConsentDecision {
        accepted: form.decision == Decision::Accept,
    };
    let step = state
        .flow()
        .decide(&grant_fields!(form), &mut session, decision)
        .await;
    respond(&state, step, &session)
}

/// Handler for `POST /authorize/signin`
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignInForm>,
) -> Response {
    let grant = match validate(&grant_fields!(form)) {
        Ok(grant) => grant,
        Err(e) => return (StatusCode::BAD_REQUEST, Html(html::invalid_request_page(e))).into_response(),
    };

    let credentials = Credentials::SignIn(SignIn {
        email: form.email,
        password: form.password,
    });

    match authenticate(&state, &credentials).await {
        Ok(outcome) => authenticated(&state, outcome, grant.as_ref()),
        Err(e) => (
            auth_error_status(&e),
            Html(html::signin_page(
                &state.config.portal.organization,
                grant.as_ref(),
                Some(&e.to_string()),
            )),
        )
            .into_response(),
    }
}

/// Handler for `POST /authorize/signup`
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SignUpForm>,
) -> Response {
    let grant = match validate(&grant_fields!(form)) {
        Ok(grant) => grant,
        Err(e) => return (StatusCode::BAD_REQUEST, Html(html::invalid_request_page(e))).into_response(),
    };

    let credentials = Credentials::SignUp(SignUp {
        first_name: form.first_name,
        last_name: form.last_name,
        email: form.email,
        password: form.password,
        password_confirmation: form.password_confirmation,
        captcha: form.captcha.unwrap_or_default(),
    });

    match authenticate(&state, &credentials).await {
        Ok(outcome) => authenticated(&state, outcome, grant.as_ref()),
        Err(e) => (
            auth_error_status(&e),
            Html(html::signup_page(
                &state.config.portal.organization,
                grant.as_ref(),
                Some(&e.to_string()),
            )),
        )
            .into_response(),
    }
}

/// Handler for `POST /logout` - clear the session cookie
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Response {
    let cookie = removal_cookie(&state.config.session.cookie_name);
    (
        [(header::SET_COOKIE, cookie.to_string())],
        Redirect::to("/authorize"),
    )
        .into_response()
}

async fn authenticate(state: &AppState, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
    state
        .flow()
        .authenticate(credentials, state.config.portal.email_domain.as_deref())
        .await
}

/// Store the new session and replay the original grant, unchanged.
fn authenticated(state: &AppState, outcome: AuthOutcome, grant: Option<&ValidGrant>) -> Response {
    match outcome {
        AuthOutcome::Authenticated { token } => {
            let cookie = session_cookie(&state.config.session, &token);
            let location = match grant {
                Some(grant) => format!("/authorize?{}", grant.to_query_string()),
                None => "/authorize".to_string(),
            };
            tracing::info!("Signed in, continuing to {}", location);
            (
                [(header::SET_COOKIE, cookie.to_string())],
                Redirect::to(&location),
            )
                .into_response()
        }
        AuthOutcome::VerificationPending { message } => {
            tracing::info!("Sign-up awaiting email verification");
            Html(html::verification_pending_page(&message)).into_response()
        }
    }
}

fn auth_error_status(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AuthError::Rejected(_) => StatusCode::UNAUTHORIZED,
        AuthError::Unreachable => StatusCode::BAD_GATEWAY,
    }
}

fn reconcile_error_status(error: &ReconcileError) -> StatusCode {
    match error {
        ReconcileError::Unreachable => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Turn a flow step into a response, expiring the cookie if the flow
/// cleared the session.
fn respond(state: &AppState, step: Step, session: &CookieSession) -> Response {
    let organization = &state.config.portal.organization;

    let mut response = match step {
        Step::Redirect(nav) => Redirect::to(nav.location()).into_response(),
        Step::Render(Screen::InvalidRequest(e)) => {
            (StatusCode::BAD_REQUEST, Html(html::invalid_request_page(e))).into_response()
        }
        Step::Render(Screen::ClientError(e)) => {
            (reconcile_error_status(&e), Html(html::client_error_page_for(&e))).into_response()
        }
        Step::Render(Screen::SignIn { grant }) => {
            Html(html::signin_page(organization, grant.as_ref(), None)).into_response()
        }
        Step::Render(Screen::SignUp { grant }) => {
            Html(html::signup_page(organization, grant.as_ref(), None)).into_response()
        }
        Step::Render(Screen::Consent(consent)) => {
            Html(html::consent_page(organization, &consent)).into_response()
        }
    };

    if let Some(removal) = session.removal_header() {
        response.headers_mut().append(header::SET_COOKIE, removal);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_grant() {
        let (grant, view) = parse_authorize_query(Some(
            "view=signup&response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fcb&state=a+b",
        ))
        .unwrap();
        assert_eq!(view, AuthView::Signup);
        assert_eq!(grant.redirect_uri.as_deref(), Some("https://cb"));
        assert_eq!(grant.state.as_deref(), Some("a b"));
    }

    #[test]
    fn test_parse_no_query_is_bare() {
        let (grant, view) = parse_authorize_query(None).unwrap();
        assert!(grant.is_bare());
        assert_eq!(view, AuthView::Signin);
    }

    #[test]
    fn test_parse_keeps_empty_values() {
        let (grant, _) = parse_authorize_query(Some("state=&client_id=c1")).unwrap();
        assert_eq!(grant.state.as_deref(), Some(""));
        assert_eq!(grant.client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_parse_repeated_grant_parameter() {
        assert_eq!(
            parse_authorize_query(Some("state=xyz&client_id=c1&state=other")),
            Err(InvalidRequest::MissingParams)
        );
    }

    #[test]
    fn test_parse_unknown_view_falls_back() {
        let (_, view) = parse_authorize_query(Some("view=foo")).unwrap();
        assert_eq!(view, AuthView::Signin);
        // Unrelated parameters are ignored, repeated or not
        assert!(parse_authorize_query(Some("utm=a&utm=b")).is_ok());
    }
}
