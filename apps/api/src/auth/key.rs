//! Service-account key material, loaded once at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Comment line the key provider prepends to every issued private key.
const PROVIDER_COMMENT_MARKER: &str = "PLEASE DO NOT REMOVE";
const PEM_BEGIN: &str = "-----BEGIN";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Service account key file not found at: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read service account key: {0}")]
    Read(#[from] std::io::Error),

    #[error("Malformed service account key: {0}")]
    Format(String),
}

/// `{keyId, serviceAccountId, privateKeyMaterial}` as issued by the identity provider.
///
/// Immutable for the process lifetime. `Debug` is implemented by hand so the
/// private key never reaches a log line.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "id")]
    pub key_id: String,
    pub service_account_id: String,
    #[serde(rename = "private_key")]
    private_key_pem: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("key_id", &self.key_id)
            .field("service_account_id", &self.service_account_id)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    #[cfg(test)]
    pub fn new(
        key_id: impl Into<String>,
        service_account_id: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            service_account_id: service_account_id.into(),
            private_key_pem: private_key_pem.into(),
        }
    }

    /// Loads the provider's JSON key file (`id`, `service_account_id`, `private_key`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        if !path.exists() {
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            return Err(KeyError::NotFound(absolute));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, KeyError> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| KeyError::Format(format!("invalid key JSON: {e}")))?;
        if key.key_id.trim().is_empty() || key.service_account_id.trim().is_empty() {
            return Err(KeyError::Format(
                "key id and service account id must be non-empty".to_string(),
            ));
        }
        Ok(key)
    }

    /// Private key as a clean PEM document: provider comment lines and anything
    /// before the `-----BEGIN` header are dropped.
    pub fn private_key_pem(&self) -> Result<String, KeyError> {
        normalize_pem(&self.private_key_pem)
    }
}

fn normalize_pem(raw: &str) -> Result<String, KeyError> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(PROVIDER_COMMENT_MARKER))
        .skip_while(|l| !l.starts_with(PEM_BEGIN))
        .collect();

    if lines.is_empty() {
        return Err(KeyError::Format("missing PEM header".to_string()));
    }
    if !lines.iter().any(|l| l.starts_with("-----END")) {
        return Err(KeyError::Format("missing PEM footer".to_string()));
    }

    let mut pem = lines.join("\n");
    pem.push('\n');
    Ok(pem)
}
