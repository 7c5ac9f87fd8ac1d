//! Per-client request budgets.
//!
//! Every route except `/health` passes through [`limit_requests`]. Clients are keyed by the
//! peer address from [`ConnectInfo`]; a request must fit both the per-minute and the per-day
//! token bucket. Failed logins spend budget too.

use crate::error::ApiError;
use crate::AppState;
use attic_core::RateLimits;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::Clock;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Keyed token buckets for the two request windows.
pub struct ClientRateLimiter {
    per_minute: DefaultKeyedRateLimiter<IpAddr>,
    per_day: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClientRateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        let day_period = Duration::from_secs(SECONDS_PER_DAY) / limits.per_day.get();
        let per_day = Quota::with_period(day_period)
            .map(|quota| quota.allow_burst(limits.per_day))
            .unwrap_or_else(|| Quota::per_second(limits.per_day));

        Self {
            per_minute: RateLimiter::keyed(Quota::per_minute(limits.per_minute)),
            per_day: RateLimiter::keyed(per_day),
        }
    }

    /// Spends one request from `client`'s budget.
    ///
    /// # Errors
    /// Returns the time until the next request would be allowed when either window is empty.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        for limiter in [&self.per_minute, &self.per_day] {
            if let Err(not_until) = limiter.check_key(&client) {
                return Err(not_until.wait_time_from(limiter.clock().now()));
            }
        }
        Ok(())
    }

    /// Forgets clients whose buckets have refilled.
    pub fn retain_recent(&self) {
        self.per_minute.retain_recent();
        self.per_day.retain_recent();
    }
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("clients", &self.per_day.len())
            .finish()
    }
}

/// Middleware that answers 429 once the calling client is over budget.
pub(crate) async fn limit_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_ip(&request);

    if let Err(wait) = state.limiter.check(client) {
        tracing::warn!(%client, uri = %request.uri(), "rate limit exceeded");
        return Err(ApiError::TooManyRequests {
            retry_after_secs: wait.as_secs().max(1),
        });
    }

    Ok(next.run(request).await)
}

/// Peer address, or the unspecified address when the server was not started with connect info.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn limits(per_minute: u32, per_day: u32) -> RateLimits {
        RateLimits {
            per_minute: NonZeroU32::new(per_minute).unwrap(),
            per_day: NonZeroU32::new(per_day).unwrap(),
        }
    }

    #[test]
    fn test_minute_window_is_enforced_per_client() {
        let limiter = ClientRateLimiter::new(limits(2, 100));
        let alice = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        let bob = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));

        assert!(limiter.check(alice).is_ok());
        assert!(limiter.check(alice).is_ok());

        let wait = limiter.check(alice).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(60));

        assert!(limiter.check(bob).is_ok());
    }

    #[test]
    fn test_day_window_applies_even_with_minute_budget_left() {
        let limiter = ClientRateLimiter::new(limits(100, 3));
        let client = IpAddr::V4(Ipv4Addr::LOCALHOST);

        for _ in 0..3 {
            assert!(limiter.check(client).is_ok());
        }

        let wait = limiter.check(client).unwrap_err();
        assert!(wait > Duration::from_secs(60));
    }
}
