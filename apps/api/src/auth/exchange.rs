//! Assertion → bearer token exchange over HTTP.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::CredentialError;

/// Default token exchange endpoint; also the audience of every assertion.
pub const IAM_TOKEN_URL: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Result of one successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub token: String,
    /// Expiry reported by the endpoint, when it reports one.
    pub expires_at: Option<DateTime<Utc>>,
}

/// The exchange seam. `CredentialCache` only talks to this trait so tests can
/// count and delay exchanges without a network.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self, assertion: &str) -> Result<ExchangedToken, CredentialError>;
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    jwt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    iam_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// POSTs `{"jwt": <assertion>}` and reads `{"iamToken": ..}` back. No retries.
#[derive(Clone)]
pub struct HttpTokenExchanger {
    client: Client,
    url: String,
}

impl HttpTokenExchanger {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(&self, assertion: &str) -> Result<ExchangedToken, CredentialError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ExchangeRequest { jwt: assertion })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ExchangeResponse = serde_json::from_str(&body)?;
        let token = parsed
            .iam_token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::MissingToken)?;

        debug!("Token exchange succeeded (expires_at={:?})", parsed.expires_at);

        Ok(ExchangedToken {
            token,
            expires_at: parsed.expires_at,
        })
    }
}
