//! Assertion signing: builds the short-lived, PS256-signed identity assertion
//! that is exchanged for a bearer credential.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::auth::key::{KeyError, ServiceAccountKey};

/// Assertions are valid for exactly one hour from issuance.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// A single-use compact JWS plus the window it is valid for.
#[derive(Debug, Clone)]
pub struct SignedAssertion {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs assertions for one service account. The private key is decoded once,
/// in `new`, so a malformed key fails at startup rather than on first use.
pub struct AssertionSigner {
    key_id: String,
    issuer: String,
    encoding_key: EncodingKey,
}

impl AssertionSigner {
    pub fn new(key: &ServiceAccountKey) -> Result<Self, KeyError> {
        let pem = key.private_key_pem()?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| KeyError::Format(format!("cannot decode RSA private key: {e}")))?;

        Ok(Self {
            key_id: key.key_id.clone(),
            issuer: key.service_account_id.clone(),
            encoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Pure function of the key, the audience and `now`.
    pub fn sign(&self, audience: &str, now: DateTime<Utc>) -> Result<SignedAssertion, KeyError> {
        let issued_at = now;
        let expires_at = issued_at + Duration::seconds(ASSERTION_LIFETIME_SECS);

        let claims = AssertionClaims {
            iss: self.issuer.clone(),
            aud: audience.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let mut header = Header::new(Algorithm::PS256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| KeyError::Format(format!("assertion signing failed: {e}")))?;

        Ok(SignedAssertion {
            token,
            issued_at,
            expires_at,
        })
    }
}
