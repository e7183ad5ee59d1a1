//! Client records and reconciliation against a validated grant.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grant::{ResponseType, ValidGrant};
use crate::scope::Scope;

/// The authorization server's registered definition of a client.
///
/// Read-only copy, held for the lifetime of a single view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub redirect_uri: String,
    pub response_type: ResponseType,
    #[serde(default)]
    pub scope: BTreeSet<String>,
}

impl ClientRecord {
    /// Requested scopes in display order.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self.scope.iter().map(|s| Scope::parse(s)).collect();
        scopes.sort();
        scopes
    }
}

/// Why a client could not be confirmed for a grant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("Client could not be found")]
    NotFound,
    /// The server refused the lookup and said why.
    #[error("Client could not be found: {0}")]
    Refused(String),
    #[error("The authorization server failed to respond")]
    Unreachable,
    #[error("URL parameter response_type and client response_type do not match")]
    MismatchResponseType,
    #[error("URL parameter redirect_uri and client redirect_uri do not match")]
    MismatchRedirectUri,
}

impl ReconcileError {
    /// Machine-readable sub-reason shown in the diagnostics disclosure.
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::NotFound | ReconcileError::Refused(_) => "not_found",
            ReconcileError::Unreachable => "unreachable",
            ReconcileError::MismatchResponseType => "mismatch_response_type",
            ReconcileError::MismatchRedirectUri => "mismatch_redirect_uri",
        }
    }
}

/// Source of client records (the authorization server).
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// Look up a client by id. Called at most once per id per view.
    async fn fetch_client(&self, client_id: &str) -> Result<ClientRecord, ReconcileError>;
}

/// A grant together with the client record it was checked against.
///
/// Only produced by [`reconcile`]; the consent state machine accepts nothing
/// else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledGrant {
    grant: ValidGrant,
    client: ClientRecord,
}

impl ReconciledGrant {
    pub fn grant(&self) -> &ValidGrant {
        &self.grant
    }

    pub fn client(&self) -> &ClientRecord {
        &self.client
    }
}

/// Cross-check a fetched client record against the grant that requested it.
///
/// The redirect URI comparison is byte-for-byte: the registered URI is the
/// only place an assertion may be delivered.
pub fn reconcile(grant: &ValidGrant, client: ClientRecord) -> Result<ReconciledGrant, ReconcileError> {
    if grant.response_type() != client.response_type {
        tracing::debug!(
            "Client {} expects response_type {}, request asked for {}",
            client.id,
            client.response_type,
            grant.response_type()
        );
        return Err(ReconcileError::MismatchResponseType);
    }

    if grant.redirect_uri() != client.redirect_uri {
        tracing::debug!("Client {} redirect_uri does not match request", client.id);
        return Err(ReconcileError::MismatchRedirectUri);
    }

    Ok(ReconciledGrant {
        grant: grant.clone(),
        client,
    })
}

/// Fetch the client named by `grant` and reconcile it in one step.
pub async fn fetch_and_reconcile(
    directory: &dyn ClientDirectory,
    grant: &ValidGrant,
) -> Result<ReconciledGrant, ReconcileError> {
    let client = directory.fetch_client(grant.client_id()).await?;
    reconcile(grant, client)
}

#[cfg(test)]
pub(crate) fn test_client(id: &str, redirect_uri: &str, response_type: ResponseType) -> ClientRecord {
    ClientRecord {
        id: id.to_string(),
        name: "Club Wiki".to_string(),
        description: "Member wiki".to_string(),
        redirect_uri: redirect_uri.to_string(),
        response_type,
        scope: ["public".to_string(), "email".to_string()].into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::test_grant;

    #[test]
    fn test_matching_client_reconciles() {
        let grant = test_grant("code", "c1", "https://x/cb", "s");
        let client = test_client("c1", "https://x/cb", ResponseType::Code);
        let reconciled = reconcile(&grant, client.clone()).unwrap();
        assert_eq!(reconciled.client(), &client);
        assert_eq!(reconciled.grant(), &grant);
    }

    #[test]
    fn test_trailing_slash_is_a_mismatch() {
        let grant = test_grant("code", "c1", "https://x/cb", "s");
        let client = test_client("c1", "https://x/cb/", ResponseType::Code);
        assert_eq!(
            reconcile(&grant, client),
            Err(ReconcileError::MismatchRedirectUri)
        );
    }

    #[test]
    fn test_case_difference_is_a_mismatch() {
        let grant = test_grant("code", "c1", "https://X/cb", "s");
        let client = test_client("c1", "https://x/cb", ResponseType::Code);
        assert_eq!(
            reconcile(&grant, client),
            Err(ReconcileError::MismatchRedirectUri)
        );
    }

    #[test]
    fn test_response_type_mismatch() {
        let grant = test_grant("token", "c1", "https://x/cb", "s");
        let client = test_client("c1", "https://x/cb", ResponseType::Code);
        let err = reconcile(&grant, client).unwrap_err();
        assert_eq!(err, ReconcileError::MismatchResponseType);
        assert_eq!(err.reason(), "mismatch_response_type");
    }

    #[test]
    fn test_record_deserializes_from_server_json() {
        let json = r#"{
            "message": "success",
            "id": "c1",
            "name": "Club Wiki",
            "description": "Member wiki",
            "response_type": "code",
            "redirect_uri": "https://x/cb",
            "scope": ["email", "public"]
        }"#;
        let record: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.response_type, ResponseType::Code);
        assert_eq!(record.scopes(), vec![Scope::Public, Scope::Email]);
    }

    #[test]
    fn test_unknown_response_type_is_not_a_record() {
        let json = r#"{"id": "c1", "name": "n", "redirect_uri": "https://x", "response_type": "basic"}"#;
        assert!(serde_json::from_str::<ClientRecord>(json).is_err());
    }

    struct FixedDirectory(Result<ClientRecord, ReconcileError>);

    #[async_trait]
    impl ClientDirectory for FixedDirectory {
        async fn fetch_client(&self, _client_id: &str) -> Result<ClientRecord, ReconcileError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_fetch_and_reconcile_propagates_lookup_failure() {
        let grant = test_grant("code", "c1", "https://x/cb", "s");
        let directory = FixedDirectory(Err(ReconcileError::Unreachable));
        assert_eq!(
            fetch_and_reconcile(&directory, &grant).await,
            Err(ReconcileError::Unreachable)
        );
    }

    #[tokio::test]
    async fn test_fetch_and_reconcile_checks_record() {
        let grant = test_grant("code", "c1", "https://x/cb", "s");
        let directory = FixedDirectory(Ok(test_client("c1", "https://evil/cb", ResponseType::Code)));
        assert_eq!(
            fetch_and_reconcile(&directory, &grant).await,
            Err(ReconcileError::MismatchRedirectUri)
        );
    }
}
