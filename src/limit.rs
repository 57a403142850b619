//! Per-client sliding-window request admission.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::ApiError;

/// Sliding-window rate limiter keyed by client IP.
///
/// Each client gets at most `max_requests` within any `window`; the denial
/// carries the number of seconds until the oldest request in the window
/// expires.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window` per client.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    /// Admit or reject a request from `client`.
    ///
    /// # Errors
    ///
    /// Returns the retry-after seconds when the client is over its limit.
    pub fn check(&self, client: IpAddr) -> Result<(), u64> {
        let now = Instant::now();
        let mut guard = self.windows.lock().unwrap();
        let entries = guard.entry(client).or_default();
        entries.retain(|t| now.duration_since(*t) < self.window);

        if entries.len() >= self.max_requests {
            // With a zero budget the window is empty; the client can only be
            // told to wait out a full window.
            let wait = entries
                .first()
                .map_or(self.window, |oldest| {
                    (*oldest + self.window).saturating_duration_since(now)
                });
            let retry_after = wait.as_secs_f64().ceil() as u64;
            return Err(retry_after.max(1));
        }

        entries.push(now);
        Ok(())
    }
}

/// Middleware enforcing the per-client limit on every route.
///
/// Falls back to a fixed loopback key when the connection carries no peer
/// address (in-process test servers).
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip());

    match state.limiter.check(client) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            tracing::warn!(%client, retry_after, "Rate limit exceeded");
            ApiError::RateLimitExceeded { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    }

    #[test]
    fn test_fourth_request_in_window_rejected() {
        let limiter = RateLimiter::new(3, Duration::from_millis(1000));

        assert!(limiter.check(client()).is_ok());
        assert!(limiter.check(client()).is_ok());
        assert!(limiter.check(client()).is_ok());

        let retry_after = limiter.check(client()).unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn test_window_elapses_and_requests_succeed_again() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));

        assert!(limiter.check(client()).is_ok());
        assert!(limiter.check(client()).is_ok());
        assert!(limiter.check(client()).is_err());

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check(client()).is_ok());
    }

    #[test]
    fn test_zero_budget_rejects_every_request() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));

        let retry_after = limiter.check(client()).unwrap_err();
        assert!(retry_after >= 1);
        assert!(retry_after <= 60);
    }

    #[test]
    fn test_clients_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_millis(1000));
        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.check(client()).is_ok());
        assert!(limiter.check(client()).is_err());
        assert!(limiter.check(other).is_ok());
    }
}
