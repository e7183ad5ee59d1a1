//! consent-core: the protocol half of the authorization portal.
//!
//! This crate decides which question to ask the user and which redirect to
//! perform in response to an OAuth2-style grant request:
//! - Validating the four grant parameters (`grant`)
//! - Reconciling them against the registered client record (`client`, `lookup`)
//! - Routing between sign-in, sign-up, consent and home (`gate`)
//! - Running the accept/reject decision (`consent`)
//!
//! All I/O goes through the collaborator traits `ClientDirectory`,
//! `IdentityProvider` and `SessionStore`; the crate itself never touches the
//! network or any storage.

pub mod client;
pub mod consent;
pub mod flow;
pub mod gate;
pub mod grant;
pub mod lookup;
pub mod scope;
pub mod session;

pub use client::{ClientDirectory, ClientRecord, ReconcileError, ReconciledGrant, reconcile};
pub use consent::{Consent, ConsentDecision, ConsentState, Navigation};
pub use flow::{AuthorizeFlow, Screen, Step};
pub use gate::{AuthView, View, gate};
pub use grant::{GrantRequest, InvalidRequest, ResponseType, ValidGrant, validate};
pub use lookup::{ClientLookup, LookupState, LookupTicket};
pub use scope::Scope;
pub use session::{
    AuthError, AuthOutcome, Credentials, IdentityProvider, SessionError, SessionStore, SignIn,
    SignUp,
};
