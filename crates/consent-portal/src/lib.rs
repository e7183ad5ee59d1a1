//! Server-rendered OAuth2 authorization portal
//!
//! Provides:
//! - `GET /authorize` sign-in, sign-up and consent views
//! - Form endpoints for sign-in, sign-up and the consent decision
//! - Cookie-backed sessions checked against the authorization server

pub mod authorize;
pub mod config;
pub mod html;
pub mod remote;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use consent_core::{AuthorizeFlow, ClientDirectory, IdentityProvider};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub directory: Arc<dyn ClientDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn flow(&self) -> AuthorizeFlow<'_> {
        AuthorizeFlow::new(
            self.directory.as_ref(),
            self.identity.as_ref(),
            &self.config.portal.landing_url,
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/authorize", get(authorize::get_handler))
        .route("/authorize/signin", post(authorize::signin_handler))
        .route("/authorize/signup", post(authorize::signup_handler))
        .route("/authorize/consent", post(authorize::consent_handler))
        .route("/logout", post(authorize::logout_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
