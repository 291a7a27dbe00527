//! Inbound rate limiting using the governor token bucket

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fingraph_common::{config::RateLimitConfig, errors::AppError};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide limiter shared by every route
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

pub struct InboundLimiter {
    limiter: GlobalRateLimiter,
    per_second: u32,
}

impl InboundLimiter {
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Build the limiter for `config`; zero values are raised to one
pub fn create_rate_limiter(config: &RateLimitConfig) -> Arc<InboundLimiter> {
    let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);
    let quota = Quota::per_second(per_second).allow_burst(burst);

    Arc::new(InboundLimiter {
        limiter: RateLimiter::direct(quota),
        per_second: per_second.get(),
    })
}

/// Reject the request with 429 once the bucket is empty
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<InboundLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check() {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Inbound rate limit exceeded");
    AppError::RateLimited {
        limit: limiter.per_second,
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = create_rate_limiter(&RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        });
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let limiter = create_rate_limiter(&RateLimitConfig {
            requests_per_second: 0,
            burst: 0,
            enabled: true,
        });
        assert!(limiter.check());
        assert_eq!(limiter.per_second, 1);
    }
}
