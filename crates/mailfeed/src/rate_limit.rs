//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

/// Clients tracked before expired windows are swept.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Allows `limit` requests per client address in each window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Counts a request from `ip`; false if it is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if clients.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Middleware rejecting over-limit clients with `429 Too Many Requests`.
pub async fn limit(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check(addr.ip()) {
        next.run(request).await
    } else {
        warn!(client = %addr.ip(), path = %request.uri().path(), "rate limited");
        (StatusCode::TOO_MANY_REQUESTS, "Too many requests\n").into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn allows_limit_then_rejects() {
        let limiter = RateLimiter::per_minute(2);
        let now = Instant::now();
        assert!(limiter.check_at(A, now));
        assert!(limiter.check_at(A, now));
        assert!(!limiter.check_at(A, now));
        assert!(limiter.check_at(B, now));
    }

    #[test]
    fn window_resets() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        assert!(limiter.check_at(A, now));
        assert!(!limiter.check_at(A, now + Duration::from_secs(59)));
        assert!(limiter.check_at(A, now + Duration::from_secs(60)));
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let limiter = RateLimiter::per_minute(0);
        assert!(!limiter.check(A));
    }

    #[test]
    fn expired_clients_are_swept() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            let ip = IpAddr::V4(Ipv4Addr::from(u32::try_from(i).unwrap()));
            limiter.check_at(ip, now);
        }
        limiter.check_at(A, now + Duration::from_secs(61));
        assert_eq!(limiter.clients.lock().unwrap().len(), 1);
    }
}
