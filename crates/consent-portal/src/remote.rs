//! Authorization server REST client
//!
//! Implements the core's `ClientDirectory` and `IdentityProvider` against the
//! server's JSON API:
//! - `GET /client/{id}`
//! - `POST /auth/signin`, `POST /auth/signup`
//! - `GET /user` (session check)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use consent_core::{
    AuthError, AuthOutcome, ClientDirectory, ClientRecord, Credentials, IdentityProvider,
    ReconcileError, SessionError,
};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

/// Untagged response body shared by the server's endpoints.
///
/// The server signals failure with `error` (and sometimes
/// `error_description`); it is turned into a tagged result right here.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "jwt")]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ApiResponse {
    fn failure_reason(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.error.as_deref())
            .filter(|s| !s.is_empty())
    }
}

const UNKNOWN_FAILURE: &str = "An unknown error has occurred. Please try again later.";

pub struct AuthServer {
    http: reqwest::Client,
    base: Url,
}

impl AuthServer {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(api_url)
            .with_context(|| format!("Invalid authorization server URL: {}", api_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Authorization server URL cannot be a base: {}", api_url);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_credentials<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, ApiResponse), AuthError> {
        let response = self
            .http
            .post(self.endpoint(&["auth", path]))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Authorization server unreachable on /auth/{}: {}", path, e);
                AuthError::Unreachable
            })?;

        let status = response.status();
        if status.is_server_error() {
            tracing::warn!("Authorization server returned {} on /auth/{}", status, path);
            return Err(AuthError::Unreachable);
        }
        let body = response.json::<ApiResponse>().await.unwrap_or_default();
        Ok((status, body))
    }
}

#[async_trait]
impl ClientDirectory for AuthServer {
    async fn fetch_client(&self, client_id: &str) -> Result<ClientRecord, ReconcileError> {
        let response = self
            .http
            .get(self.endpoint(&["client", client_id]))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Client lookup for {} failed: {}", client_id, e);
                ReconcileError::Unreachable
            })?;

        let status = response.status();
        if status.is_server_error() {
            tracing::warn!("Client lookup for {} returned {}", client_id, status);
            return Err(ReconcileError::Unreachable);
        }
        if !status.is_success() {
            tracing::debug!("Client lookup for {} returned {}", client_id, status);
            let body = response.json::<ApiResponse>().await.unwrap_or_default();
            return Err(match body.failure_reason() {
                Some(reason) => ReconcileError::Refused(reason.to_string()),
                None => ReconcileError::NotFound,
            });
        }

        response.json::<ClientRecord>().await.map_err(|e| {
            tracing::debug!("Client lookup for {} returned no usable record: {}", client_id, e);
            ReconcileError::NotFound
        })
    }
}

#[async_trait]
impl IdentityProvider for AuthServer {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let (status, body) = match credentials {
            Credentials::SignIn(sign_in) => self.post_credentials("signin", sign_in).await?,
            Credentials::SignUp(sign_up) => self.post_credentials("signup", sign_up).await?,
        };

        if !status.is_success() || body.error.is_some() {
            let reason = body.failure_reason().unwrap_or(UNKNOWN_FAILURE);
            return Err(AuthError::Rejected(reason.to_string()));
        }

        match (credentials, body.token) {
            (Credentials::SignIn(_), Some(token)) if !token.is_empty() => {
                Ok(AuthOutcome::Authenticated { token })
            }
            (Credentials::SignIn(_), _) => Err(AuthError::Rejected(UNKNOWN_FAILURE.to_string())),
            (Credentials::SignUp(_), Some(token)) if !token.is_empty() => {
                Ok(AuthOutcome::Authenticated { token })
            }
            (Credentials::SignUp(_), _) => Ok(AuthOutcome::VerificationPending {
                message: body
                    .message
                    .unwrap_or_else(|| "awaiting email verification".to_string()),
            }),
        }
    }

    async fn verify_session(&self, token: &str) -> Result<(), SessionError> {
        let response = self
            .http
            .get(self.endpoint(&["user"]))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Session check failed: {}", e);
                SessionError::Unreachable
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            tracing::warn!("Session check returned {}", status);
            Err(SessionError::Unreachable)
        } else {
            tracing::debug!("Session rejected with {}", status);
            Err(SessionError::Rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_client_id() {
        let server = AuthServer::new("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(
            server.endpoint(&["client", "a b/c"]).as_str(),
            "http://localhost:8080/client/a%20b%2Fc"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let server = AuthServer::new("https://auth.example.com/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            server.endpoint(&["auth", "signin"]).as_str(),
            "https://auth.example.com/api/auth/signin"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(AuthServer::new("mailto:admin@example.com", Duration::from_secs(1)).is_err());
        assert!(AuthServer::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_failure_reason_prefers_description() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"error":"invalid_request","error_description":"bad state"}"#)
                .unwrap();
        assert_eq!(body.failure_reason(), Some("bad state"));

        let body: ApiResponse = serde_json::from_str(r#"{"error":"Incorrect username or password"}"#).unwrap();
        assert_eq!(body.failure_reason(), Some("Incorrect username or password"));
    }

    #[test]
    fn test_jwt_field_is_accepted_as_token() {
        let body: ApiResponse = serde_json::from_str(r#"{"message":"success","jwt":"T"}"#).unwrap();
        assert_eq!(body.token.as_deref(), Some("T"));
    }
}
