/// Completion client: the single point of entry for calls to the completion endpoint.
///
/// ARCHITECTURAL RULE: no other module talks to the completion API directly.
/// Credentials are not this module's concern: the bearer token is passed in per call,
/// so the credential lock is never held while a completion is in flight.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod envelope;
pub mod prompts;

pub const DEFAULT_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection to completion endpoint failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportError {
    /// HTTP status, when the endpoint answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            TransportError::Status { status, .. } => Some(*status),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            TransportError::Http(_) => None,
            TransportError::Status { body, .. } => Some(body),
        }
    }

    /// 429, 5xx and connection-level failures are worth another attempt.
    fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_connect() || e.is_timeout(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: [CompletionMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    /// The endpoint takes int64 fields as decimal strings.
    max_tokens: String,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    text: &'a str,
}

/// The completion seam. The orchestrator depends on this trait so its tests can
/// script replies without a network.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Returns the raw response body; interpreting it is the caller's job.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        token: &str,
    ) -> Result<String, TransportError>;
}

#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub model_uri: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub folder_id: Option<String>,
    /// Extra attempts on transient failures. Zero keeps the single-shot behaviour.
    pub max_retries: u32,
}

#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    settings: CompletionSettings,
    retry_backoff: Duration,
}

impl CompletionClient {
    pub fn new(client: Client, settings: CompletionSettings) -> Self {
        Self {
            client,
            settings,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// First retry waits this long; each further retry doubles it.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn model_uri(&self) -> &str {
        &self.settings.model_uri
    }

    async fn send_once(&self, body: &CompletionRequest<'_>, token: &str) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(token)
            .json(body);
        if let Some(folder_id) = &self.settings.folder_id {
            request = request.header("x-folder-id", folder_id);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        token: &str,
    ) -> Result<String, TransportError> {
        let body = CompletionRequest {
            model_uri: &self.settings.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens.to_string(),
            },
            messages: [
                CompletionMessage {
                    role: "system",
                    text: system_prompt,
                },
                CompletionMessage {
                    role: "user",
                    text: user_prompt,
                },
            ],
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&body, token).await {
                Ok(text) => {
                    debug!("Completion call succeeded ({} bytes)", text.len());
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.settings.max_retries => {
                    let delay = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        "Completion attempt {} failed, retrying after {}ms: {e}",
                        attempt,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    inner
        .trim_start()
        .strip_suffix("```")
        .unwrap_or(inner)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn settings(endpoint: String, max_retries: u32) -> CompletionSettings {
        CompletionSettings {
            endpoint,
            model_uri: "gpt://folder/yandexgpt-lite/latest".to_string(),
            temperature: 0.6,
            max_tokens: 2000,
            folder_id: Some("folder".to_string()),
            max_retries,
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_unterminated() {
        let input = "```json\n{\"key\": 1}";
        assert_eq!(strip_json_fences(input), "{\"key\": 1}");
    }

    #[tokio::test]
    async fn test_complete_sends_fixed_body_shape_and_bearer() {
        let app = Router::new().route(
            "/completion",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer t1.token");
                assert_eq!(headers["x-folder-id"], "folder");
                assert_eq!(body["modelUri"], "gpt://folder/yandexgpt-lite/latest");
                assert_eq!(body["completionOptions"]["stream"], false);
                assert_eq!(body["completionOptions"]["maxTokens"], "2000");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][0]["text"], "sys");
                assert_eq!(body["messages"][1]["role"], "user");
                assert_eq!(body["messages"][1]["text"], "usr");
                Json(json!({"result": {"alternatives": [{"message": {"role": "assistant", "text": "ok"}}]}}))
            }),
        );
        let base = serve(app).await;
        let client = CompletionClient::new(Client::new(), settings(format!("{base}/completion"), 0));

        let raw = client.complete("sys", "usr", "t1.token").await.unwrap();
        assert!(raw.contains("\"alternatives\""));
    }

    #[tokio::test]
    async fn test_complete_non_2xx_surfaces_status_and_body() {
        let app = Router::new().route(
            "/",
            post(|| async { (StatusCode::FORBIDDEN, "permission denied") }),
        );
        let base = serve(app).await;
        let client = CompletionClient::new(Client::new(), settings(format!("{base}/"), 0));

        let err = client.complete("s", "u", "t").await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.body(), Some("permission denied"));
    }

    #[tokio::test]
    async fn test_complete_does_not_retry_by_default() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::SERVICE_UNAVAILABLE, "busy")
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;
        let client = CompletionClient::new(Client::new(), settings(format!("{base}/"), 0));

        let err = client.complete("s", "u", "t").await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete_retries_transient_failures_when_enabled() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::TOO_MANY_REQUESTS, "slow down".to_string())
                    } else {
                        (StatusCode::OK, "{\"result\":{}}".to_string())
                    }
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;
        let client = CompletionClient::new(Client::new(), settings(format!("{base}/"), 2))
            .with_retry_backoff(Duration::from_millis(5));

        let raw = client.complete("s", "u", "t").await.unwrap();
        assert_eq!(raw, "{\"result\":{}}");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_complete_never_retries_client_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::BAD_REQUEST, "bad body")
                }),
            )
            .with_state(hits.clone());
        let base = serve(app).await;
        let client = CompletionClient::new(Client::new(), settings(format!("{base}/"), 3))
            .with_retry_backoff(Duration::from_millis(5));

        assert!(client.complete("s", "u", "t").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_complete_connection_failure_has_no_status() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = CompletionClient::new(Client::new(), settings(format!("http://{addr}/"), 0));
        let err = client.complete("s", "u", "t").await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }
}
