//! Per-view client lookup slot.
//!
//! A view owns one `ClientLookup`. Each new client id bumps the generation;
//! a result is only applied when its ticket carries the current generation,
//! so the last request always wins and a slow stale response can never
//! overwrite a newer one. The underlying fetch is never aborted.

use crate::client::{ReconcileError, ReconciledGrant};

/// What the view currently knows about its client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LookupState {
    /// No lookup has been requested.
    #[default]
    Idle,
    /// A fetch is in flight; render a loading state, not an error.
    Loading,
    Loaded(ReconciledGrant),
    Failed(ReconcileError),
}

/// Proof that a fetch was started; hand it back with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    generation: u64,
    client_id: String,
}

impl LookupTicket {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

#[derive(Debug, Default)]
pub struct ClientLookup {
    state: LookupState,
    generation: u64,
    client_id: Option<String>,
}

impl ClientLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LookupState {
        &self.state
    }

    /// Start a lookup for `client_id`.
    ///
    /// Returns `None` when a lookup for the same id is already in flight or
    /// finished; the caller must not fetch again.
    pub fn begin(&mut self, client_id: &str) -> Option<LookupTicket> {
        if self.client_id.as_deref() == Some(client_id) && self.state != LookupState::Idle {
            return None;
        }

        self.generation += 1;
        self.client_id = Some(client_id.to_string());
        self.state = LookupState::Loading;

        Some(LookupTicket {
            generation: self.generation,
            client_id: client_id.to_string(),
        })
    }

    /// Apply a lookup result. Returns `false` if the ticket is stale and the
    /// result was discarded.
    pub fn complete(
        &mut self,
        ticket: LookupTicket,
        result: Result<ReconciledGrant, ReconcileError>,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale client lookup for {} (generation {}, current {})",
                ticket.client_id,
                ticket.generation,
                self.generation
            );
            return false;
        }

        self.state = match result {
            Ok(reconciled) => LookupState::Loaded(reconciled),
            Err(e) => LookupState::Failed(e),
        };
        true
    }
}
