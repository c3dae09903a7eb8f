//! Credential suppliers injected into the negotiator, uploader and poller.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::remote::RemoteFuture;

/// Headers a remote call must carry to authenticate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(Vec<(String, String)>);

impl AuthHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Self {
        Self::new().with("Authorization", format!("Bearer {token}"))
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Yields valid auth headers on demand.
///
/// Engine components call [`invalidate`](Self::invalidate) after the remote
/// answers with [`UploadError::Auth`], so the next call fetches fresh
/// credentials instead of replaying rejected ones.
pub trait CredentialSupplier: Send + Sync {
    fn auth_headers(&self) -> RemoteFuture<'_, AuthHeaders>;

    fn invalidate(&self) {}
}

/// Fixed headers, e.g. a long-lived API key.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(AuthHeaders);

impl StaticCredentials {
    pub fn new(headers: AuthHeaders) -> Self {
        Self(headers)
    }
}

impl CredentialSupplier for StaticCredentials {
    fn auth_headers(&self) -> RemoteFuture<'_, AuthHeaders> {
        let headers = self.0.clone();
        Box::pin(async move { Ok(headers) })
    }
}

// ---------------------------------------------------------------------------
// Expiring bearer tokens
// ---------------------------------------------------------------------------

/// An access token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Obtains a fresh token, e.g. via a client-credentials exchange.
pub trait TokenSource: Send + Sync {
    fn fetch(&self) -> RemoteFuture<'_, Token>;
}

/// Caches a bearer token and refreshes it shortly before expiry.
///
/// Concurrent callers share one refresh: the cache lock is held across the
/// fetch, so workers that arrive during a refresh wait for its result.
pub struct TokenManager<S> {
    source: S,
    refresh_margin: TimeDelta,
    cached: Mutex<Option<Token>>,
    invalidated: AtomicBool,
}

impl<S: TokenSource> TokenManager<S> {
    /// Refreshes when less than 5 minutes of validity remain.
    pub fn new(source: S) -> Self {
        Self::with_refresh_margin(source, TimeDelta::minutes(5))
    }

    pub fn with_refresh_margin(source: S, refresh_margin: TimeDelta) -> Self {
        Self {
            source,
            refresh_margin,
            cached: Mutex::new(None),
            invalidated: AtomicBool::new(false),
        }
    }

    /// Returns a token valid for at least the refresh margin.
    pub async fn token(&self) -> Result<Token, UploadError> {
        let mut cached = self.cached.lock().await;
        if self.invalidated.swap(false, Ordering::AcqRel) {
            *cached = None;
        }
        if let Some(token) = cached.as_ref()
            && token.expires_at - Utc::now() > self.refresh_margin
        {
            return Ok(token.clone());
        }

        debug!("refreshing access token");
        let token = self.source.fetch().await?;
        info!(expires_at = %token.expires_at, "access token refreshed");
        *cached = Some(token.clone());
        Ok(token)
    }
}

impl<S: TokenSource> CredentialSupplier for TokenManager<S> {
    fn auth_headers(&self) -> RemoteFuture<'_, AuthHeaders> {
        Box::pin(async move {
            let token = self.token().await?;
            Ok(AuthHeaders::bearer(&token.access_token))
        })
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        fetches: AtomicUsize,
        lifetime: TimeDelta,
    }

    impl CountingSource {
        fn new(lifetime: TimeDelta) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                lifetime,
            }
        }
    }

    impl TokenSource for CountingSource {
        fn fetch(&self) -> RemoteFuture<'_, Token> {
            Box::pin(async move {
                let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::task::yield_now().await;
                Ok(Token {
                    access_token: format!("token-{n}"),
                    expires_at: Utc::now() + self.lifetime,
                })
            })
        }
    }

    #[test]
    fn bearer_header() {
        let h = AuthHeaders::bearer("abc");
        assert_eq!(h.get("authorization"), Some("Bearer abc"));
        assert!(!h.is_empty());
    }

    #[tokio::test]
    async fn static_credentials_return_headers() {
        let creds = StaticCredentials::new(AuthHeaders::new().with("x-api-key", "k"));
        let h = creds.auth_headers().await.unwrap();
        assert_eq!(h.iter().collect::<Vec<_>>(), vec![("x-api-key", "k")]);
    }

    #[tokio::test]
    async fn token_is_cached_while_valid() {
        let mgr = TokenManager::new(CountingSource::new(TimeDelta::hours(1)));
        let a = mgr.token().await.unwrap();
        let b = mgr.token().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(mgr.source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_near_expiry_is_refreshed() {
        let mgr = TokenManager::new(CountingSource::new(TimeDelta::minutes(2)));
        let a = mgr.token().await.unwrap();
        let b = mgr.token().await.unwrap();
        assert_ne!(a.access_token, b.access_token);
        assert_eq!(mgr.source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let mgr = TokenManager::new(CountingSource::new(TimeDelta::hours(1)));
        mgr.token().await.unwrap();
        mgr.invalidate();
        let h = mgr.auth_headers().await.unwrap();
        assert_eq!(h.get("Authorization"), Some("Bearer token-2"));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mgr = Arc::new(TokenManager::new(CountingSource::new(TimeDelta::hours(1))));
        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let m = Arc::clone(&mgr);
            set.spawn(async move { m.token().await.unwrap() });
        }
        while let Some(token) = set.join_next().await {
            assert_eq!(token.unwrap().access_token, "token-1");
        }
        assert_eq!(mgr.source.fetches.load(Ordering::SeqCst), 1);
    }
}
