//! Token-bucket request limiter shared by every caller of one model.

use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Non-blocking permit check. Waiting is the caller's decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestLimiter: Send + Sync {
    async fn try_acquire(&self) -> bool;
}

/// `governor` limiter admitting at most `requests_per_second` calls in any
/// one-second window.
pub struct GovernorLimiter<C: Clock = DefaultClock> {
    inner: RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<C::Instant>>,
}

fn quota(requests_per_second: u32) -> Quota {
    // Burst of one: permits are spaced evenly, never bunched.
    Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN)
}

impl GovernorLimiter {
    /// A rate of zero is treated as one request per second.
    pub fn per_second(requests_per_second: u32) -> Self {
        Self {
            inner: RateLimiter::direct(quota(requests_per_second)),
        }
    }
}

impl<C: Clock> GovernorLimiter<C> {
    pub fn with_clock(requests_per_second: u32, clock: C) -> Self {
        Self {
            inner: RateLimiter::direct_with_clock(quota(requests_per_second), clock),
        }
    }
}

#[async_trait]
impl<C> RequestLimiter for GovernorLimiter<C>
where
    C: Clock + Send + Sync,
    C::Instant: Send + Sync,
{
    async fn try_acquire(&self) -> bool {
        self.inner.check().is_ok()
    }
}
