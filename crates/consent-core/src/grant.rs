//! Grant request parsing and validation.
//!
//! A visitor either arrives bare (no grant parameters at all) or redirected by
//! a client (all four parameters present). Anything in between is a malformed
//! redirect and must end in an error view.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names of the grant parameters as they appear in the query string.
pub const GRANT_PARAMS: [&str; 4] = ["response_type", "client_id", "redirect_uri", "state"];

/// OAuth2 response type requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Authorization code grant
    Code,
    /// Implicit grant
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }
}

impl Display for ResponseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = InvalidRequest;

    /// Exact match only: `"Code"` or `" code"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            _ => Err(InvalidRequest::BadResponseType),
        }
    }
}

/// Why a grant request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("The authorization request is missing required URL parameters")]
    MissingParams,
    #[error("The authorization request's response_type was not one of 'code' or 'token'")]
    BadResponseType,
    #[error("The state parameter cannot be an empty string")]
    EmptyState,
    #[error("The redirect_uri parameter cannot be an empty string")]
    EmptyRedirectUri,
}

impl InvalidRequest {
    /// Machine-readable sub-reason shown in the diagnostics disclosure.
    pub fn reason(&self) -> &'static str {
        match self {
            InvalidRequest::MissingParams => "missing_params",
            InvalidRequest::BadResponseType => "bad_response_type",
            InvalidRequest::EmptyState => "empty_state",
            InvalidRequest::EmptyRedirectUri => "empty_redirect_uri",
        }
    }
}

/// Raw grant parameters as read from the query string.
///
/// `None` means the parameter was absent; `Some("")` means it was present but
/// empty. The two are validated differently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GrantRequest {
    fn fields(&self) -> [Option<&str>; 4] {
        [
            self.response_type.as_deref(),
            self.client_id.as_deref(),
            self.redirect_uri.as_deref(),
            self.state.as_deref(),
        ]
    }

    /// True when no grant parameter was supplied at all.
    pub fn is_bare(&self) -> bool {
        self.fields().iter().all(Option::is_none)
    }
}

/// A grant request that passed validation.
///
/// Only obtainable through [`validate`], so holding one proves all four
/// parameters were present and well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidGrant {
    response_type: ResponseType,
    client_id: String,
    redirect_uri: String,
    state: String,
}

impl ValidGrant {
    pub fn response_type(&self) -> ResponseType {
        self.response_type
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// The parameters in their original form, for replaying the grant across
    /// the sign-in round trip.
    pub fn query_pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("response_type", self.response_type.as_str()),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("state", &self.state),
        ]
    }

    /// Percent-encoded `key=value&...` form of [`ValidGrant::query_pairs`].
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_pairs())
            .finish()
    }
}

impl From<&ValidGrant> for GrantRequest {
    fn from(grant: &ValidGrant) -> Self {
        Self {
            response_type: Some(grant.response_type.as_str().to_string()),
            client_id: Some(grant.client_id.clone()),
            redirect_uri: Some(grant.redirect_uri.clone()),
            state: Some(grant.state.clone()),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validate a raw grant request.
///
/// Returns `Ok(None)` for a bare visitor, `Ok(Some(grant))` when all four
/// parameters are present and well formed.
pub fn validate(request: &GrantRequest) -> Result<Option<ValidGrant>, InvalidRequest> {
    if request.is_bare() {
        return Ok(None);
    }
    let present = request.fields().iter().filter(|f| f.is_some()).count();
    if present < GRANT_PARAMS.len() {
        return Err(InvalidRequest::MissingParams);
    }

    let (Some(response_type), Some(client_id), Some(redirect_uri), Some(state)) = (
        request.response_type.as_deref(),
        request.client_id.as_deref(),
        request.redirect_uri.as_deref(),
        request.state.as_deref(),
    ) else {
        return Err(InvalidRequest::MissingParams);
    };

    let response_type = response_type.parse::<ResponseType>()?;
    if is_blank(client_id) {
        return Err(InvalidRequest::MissingParams);
    }
    if is_blank(state) {
        return Err(InvalidRequest::EmptyState);
    }
    if is_blank(redirect_uri) {
        return Err(InvalidRequest::EmptyRedirectUri);
    }

    Ok(Some(ValidGrant {
        response_type,
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
        state: state.to_string(),
    }))
}

#[cfg(test)]
pub(crate) fn test_grant(response_type: &str, client_id: &str, redirect_uri: &str, state: &str) -> ValidGrant {
    validate(&request(
        Some(response_type),
        Some(client_id),
        Some(redirect_uri),
        Some(state),
    ))
    .unwrap()
    .unwrap()
}

#[cfg(test)]
pub(crate) fn request(
    response_type: Option<&str>,
    client_id: Option<&str>,
    redirect_uri: Option<&str>,
    state: Option<&str>,
) -> GrantRequest {
    GrantRequest {
        response_type: response_type.map(String::from),
        client_id: client_id.map(String::from),
        redirect_uri: redirect_uri.map(String::from),
        state: state.map(String::from),
    }
}
