use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::kv::KvStore;
use crate::AppState;

/// Fixed-window request counter per client, stored in a [`KvStore`].
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Returns `true` and counts the request when `client` is still under
    /// the limit for the current window.
    pub async fn check(&self, client: &str) -> bool {
        let key = format!("ratelimit_{}", client);
        let current = self
            .store
            .get(&key)
            .await
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        if current >= self.limit {
            return false;
        }
        self.store.incr(&key, self.window).await;
        true
    }
}

/// Client identity: the socket peer, or the first `X-Forwarded-For` hop when
/// `trust_forwarded` says a proxy in front of us sets that header.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    let forwarded = trust_forwarded
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

pub async fn limit_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer, state.config.trust_forwarded_for);

    if !state.rate_limiter.check(&ip).await {
        warn!("Rate limit exceeded for {}", ip);
        return ApiError::RateLimited.into_response();
    }
    debug!("Rate limit ok for {}", ip);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn limiter(limit: u64) -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::default()), limit, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_rejects_after_limit() {
        let limiter = limiter(10);
        for _ in 0..10 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn test_clients_are_isolated() {
        let limiter = limiter(1);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryStore::default()),
            1,
            Duration::from_millis(50),
        );
        assert!(limiter.check("10.0.0.3").await);
        assert!(!limiter.check("10.0.0.3").await);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.check("10.0.0.3").await);
    }

    #[test]
    fn test_client_ip_ignores_forwarded_header_by_default() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.168.1.2:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), false), "192.168.1.2");
        assert_eq!(client_ip(&headers, None, false), "127.0.0.1");
    }

    #[test]
    fn test_client_ip_uses_forwarded_header_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.168.1.2:4000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer), true), "203.0.113.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "192.168.1.2");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "127.0.0.1");
    }
}
