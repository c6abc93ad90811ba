//! Bearer-credential plumbing for the completion endpoint.
//!
//! Flow: ServiceAccountKey → AssertionSigner (PS256 JWS) → TokenExchanger (HTTP)
//!       → CredentialCache (single-flight, renewed 300s before expiry).
//!
//! Only `CredentialCache` holds mutable state. It is owned by `AppState` and shared
//! by handle; nothing in this module is a global.

use thiserror::Error;

pub mod cache;
pub mod exchange;
pub mod key;
pub mod signer;

pub use cache::{CredentialCache, TokenProvider};
pub use exchange::{HttpTokenExchanger, TokenExchanger};
pub use key::{KeyError, ServiceAccountKey};
pub use signer::AssertionSigner;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Assertion could not be built: {0}")]
    Key(#[from] KeyError),

    #[error("Token exchange request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token exchange rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Token exchange response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Token exchange response has no iamToken field")]
    MissingToken,

    #[error("Token renewal failed while this request was waiting: {0}")]
    RecentFailure(String),
}
