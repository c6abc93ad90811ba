//! CredentialCache: single-flight, proactively renewed bearer credential.
//!
//! The mutex is held across "check freshness → sign → exchange → store", so at most
//! one exchange is in flight and every concurrent caller reads the value it produced.
//! The lock is never held while a completion call is running: callers get an owned
//! `String` back and the guard is dropped before they use it.
//!
//! Failures are shared the same way. Callers that queued behind a renewal which then
//! failed get that failure (or the still-valid old token) instead of starting an
//! exchange of their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::exchange::TokenExchanger;
use crate::auth::signer::AssertionSigner;
use crate::auth::CredentialError;

/// Assumed lifetime of an exchanged token when the endpoint does not report one.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;
/// Renew this long before expiry so a dependent call never starts with a dying token.
pub const RENEWAL_SKEW_SECS: i64 = 300;

/// Anything that can hand out a bearer token. Implemented by `CredentialCache`;
/// the orchestrator depends on this trait only.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, CredentialError>;
}

#[derive(Clone)]
struct CachedCredential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedCredential {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(RENEWAL_SKEW_SECS)
    }

    fn is_unexpired(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Outcome of the most recent renewal, if it failed.
struct RenewalFailure {
    attempt: u64,
    message: String,
}

#[derive(Default)]
struct CacheState {
    credential: Option<CachedCredential>,
    failure: Option<RenewalFailure>,
}

pub struct CredentialCache {
    signer: AssertionSigner,
    audience: String,
    exchanger: Arc<dyn TokenExchanger>,
    state: Mutex<CacheState>,
    /// Number of renewal attempts that have completed, bumped under the lock.
    finished: AtomicU64,
}

impl CredentialCache {
    pub fn new(
        signer: AssertionSigner,
        audience: impl Into<String>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            signer,
            audience: audience.into(),
            exchanger,
            state: Mutex::new(CacheState::default()),
            finished: AtomicU64::new(0),
        }
    }

    pub async fn get_token(&self) -> Result<String, CredentialError> {
        self.token_at(Utc::now()).await
    }

    async fn token_at(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let ticket = self.finished.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;

        if let Some(credential) = state.credential.as_ref().filter(|c| c.is_fresh(now)) {
            debug!("Using cached bearer token");
            return Ok(credential.token.clone());
        }

        // A renewal finished and failed while this caller was queued on the lock.
        if let Some(failure) = state.failure.as_ref().filter(|f| f.attempt > ticket) {
            if let Some(credential) = state.credential.as_ref().filter(|c| c.is_unexpired(now)) {
                return Ok(credential.token.clone());
            }
            return Err(CredentialError::RecentFailure(failure.message.clone()));
        }

        info!("Renewing bearer token (key id {})", self.signer.key_id());
        let outcome = self.renew(now).await;
        let attempt = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        match outcome {
            Ok(credential) => {
                info!("Bearer token renewed, expires at {}", credential.expires_at);
                let token = credential.token.clone();
                state.credential = Some(credential);
                state.failure = None;
                Ok(token)
            }
            Err(e) => {
                state.failure = Some(RenewalFailure {
                    attempt,
                    message: e.to_string(),
                });
                // Inside the renewal window the old token is still valid; past its
                // hard expiry it is dropped and the error propagates.
                if let Some(credential) = state.credential.as_ref().filter(|c| c.is_unexpired(now)) {
                    warn!(
                        "Bearer token renewal failed, serving token valid until {}: {e}",
                        credential.expires_at
                    );
                    return Ok(credential.token.clone());
                }
                state.credential = None;
                Err(e)
            }
        }
    }

    async fn renew(&self, now: DateTime<Utc>) -> Result<CachedCredential, CredentialError> {
        let assertion = self.signer.sign(&self.audience, now)?;
        debug!(
            "Signed assertion issued at {}, valid until {}",
            assertion.issued_at, assertion.expires_at
        );
        let exchanged = self.exchanger.exchange(&assertion.token).await?;

        let assumed = now + Duration::seconds(TOKEN_LIFETIME_SECS);
        let expires_at = match exchanged.expires_at {
            Some(reported) if reported < assumed => reported,
            _ => assumed,
        };

        Ok(CachedCredential {
            token: exchanged.token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenProvider for CredentialCache {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        self.get_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::exchange::ExchangedToken;
    use crate::auth::key::ServiceAccountKey;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::task::JoinSet;

    const KEY_JSON: &str = include_str!("../../testdata/sa-key.json");

    /// Counts exchanges, hands out `token-1`, `token-2`, ... and can be told to fail.
    #[derive(Default)]
    struct FakeExchanger {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay_ms: u64,
        reported_expiry: Option<DateTime<Utc>>,
    }

    #[async_trait]
    impl TokenExchanger for FakeExchanger {
        async fn exchange(&self, assertion: &str) -> Result<ExchangedToken, CredentialError> {
            assert_eq!(assertion.split('.').count(), 3);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(CredentialError::MissingToken);
            }
            Ok(ExchangedToken {
                token: format!("token-{n}"),
                expires_at: self.reported_expiry,
            })
        }
    }

    fn cache_with(exchanger: Arc<FakeExchanger>) -> CredentialCache {
        let key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
        let signer = AssertionSigner::new(&key).unwrap();
        CredentialCache::new(signer, "https://iam.example/tokens", exchanger)
    }

    #[tokio::test]
    async fn test_repeated_calls_within_window_exchange_once() {
        let exchanger = Arc::new(FakeExchanger::default());
        let cache = cache_with(exchanger.clone());
        let t0 = Utc::now();

        for i in 0..10 {
            let token = cache.token_at(t0 + Duration::seconds(i * 60)).await.unwrap();
            assert_eq!(token, "token-1");
        }
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let exchanger = Arc::new(FakeExchanger {
            delay_ms: 50,
            ..Default::default()
        });
        let cache = Arc::new(cache_with(exchanger.clone()));

        let mut set = JoinSet::new();
        for _ in 0..16 {
            let cache = cache.clone();
            set.spawn(async move { cache.get_token().await.unwrap() });
        }

        let mut tokens = Vec::new();
        while let Some(result) = set.join_next().await {
            tokens.push(result.unwrap());
        }

        assert_eq!(tokens.len(), 16);
        assert!(tokens.iter().all(|t| t == "token-1"));
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_renews_inside_skew_window_not_only_after_expiry() {
        let exchanger = Arc::new(FakeExchanger::default());
        let cache = cache_with(exchanger.clone());
        let t0 = Utc::now();

        assert_eq!(cache.token_at(t0).await.unwrap(), "token-1");

        let just_before_window = t0 + Duration::seconds(TOKEN_LIFETIME_SECS - RENEWAL_SKEW_SECS - 1);
        assert_eq!(cache.token_at(just_before_window).await.unwrap(), "token-1");

        let inside_window = t0 + Duration::seconds(TOKEN_LIFETIME_SECS - RENEWAL_SKEW_SECS + 1);
        assert_eq!(cache.token_at(inside_window).await.unwrap(), "token-2");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reported_expiry_shortens_cached_lifetime() {
        let t0 = Utc::now();
        let exchanger = Arc::new(FakeExchanger {
            reported_expiry: Some(t0 + Duration::seconds(600)),
            ..Default::default()
        });
        let cache = cache_with(exchanger.clone());

        assert_eq!(cache.token_at(t0).await.unwrap(), "token-1");
        assert_eq!(
            cache.token_at(t0 + Duration::seconds(299)).await.unwrap(),
            "token-1"
        );
        assert_eq!(
            cache.token_at(t0 + Duration::seconds(301)).await.unwrap(),
            "token-2"
        );
    }

    #[tokio::test]
    async fn test_failure_without_cached_token_propagates() {
        let exchanger = Arc::new(FakeExchanger::default());
        exchanger.failing.store(true, Ordering::SeqCst);
        let cache = cache_with(exchanger.clone());

        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingToken));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_failed_exchange() {
        let exchanger = Arc::new(FakeExchanger {
            delay_ms: 100,
            ..Default::default()
        });
        exchanger.failing.store(true, Ordering::SeqCst);
        let cache = Arc::new(cache_with(exchanger.clone()));

        let mut set = JoinSet::new();
        for _ in 0..10 {
            let cache = cache.clone();
            set.spawn(async move { cache.get_token().await });
        }

        let mut failures = 0;
        while let Some(result) = set.join_next().await {
            assert!(result.unwrap().is_err());
            failures += 1;
        }

        assert_eq!(failures, 10);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_renewal_serves_token_until_hard_expiry_only() {
        let exchanger = Arc::new(FakeExchanger::default());
        let cache = cache_with(exchanger.clone());
        let t0 = Utc::now();
        assert_eq!(cache.token_at(t0).await.unwrap(), "token-1");

        exchanger.failing.store(true, Ordering::SeqCst);

        let inside_window = t0 + Duration::seconds(TOKEN_LIFETIME_SECS - 10);
        assert_eq!(cache.token_at(inside_window).await.unwrap(), "token-1");

        let past_expiry = t0 + Duration::seconds(TOKEN_LIFETIME_SECS + 1);
        assert!(cache.token_at(past_expiry).await.is_err());
    }

    #[tokio::test]
    async fn test_recovers_after_failed_exchange() {
        let exchanger = Arc::new(FakeExchanger::default());
        exchanger.failing.store(true, Ordering::SeqCst);
        let cache = cache_with(exchanger.clone());

        assert!(cache.get_token().await.is_err());
        exchanger.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
    }
}
