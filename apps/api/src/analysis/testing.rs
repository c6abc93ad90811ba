//! Scriptable stand-ins for the token and completion seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::auth::{CredentialError, TokenProvider};
use crate::llm_client::{CompletionBackend, TransportError};

pub(crate) struct FakeTokens {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeTokens {
    pub fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CredentialError::MissingToken);
        }
        Ok("fake-bearer".to_string())
    }
}

/// Replies with `reply` wrapped in a completion envelope, or fails with `status`.
pub(crate) struct FakeCompletion {
    reply: String,
    status: Option<u16>,
    /// (system, user, token) of every call.
    pub seen: Mutex<Vec<(String, String, String)>>,
}

impl FakeCompletion {
    pub fn replying(text: &str) -> Self {
        let reply = serde_json::json!({
            "result": {"alternatives": [{"message": {"role": "assistant", "text": text}}]}
        })
        .to_string();
        Self {
            reply,
            status: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: String::new(),
            status: Some(status),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        token: &str,
    ) -> Result<String, TransportError> {
        self.seen.lock().unwrap().push((
            system_prompt.to_string(),
            user_prompt.to_string(),
            token.to_string(),
        ));
        match self.status {
            Some(status) => Err(TransportError::Status {
                status,
                body: "upstream unavailable".to_string(),
            }),
            None => Ok(self.reply.clone()),
        }
    }
}
