//! Rate limiting for flood protection.
//!
//! Implements a token bucket algorithm for rate limiting client events.

use std::time::Instant;

/// Token bucket rate limiter.
///
/// Tokens are added at a fixed rate per second; each event costs 1 token.
/// With no tokens available the event is rejected (rate limit exceeded).
pub struct RateLimiter {
    tokens: f32,
    last_check: Instant,
    rate: f32,
    capacity: f32,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `rate` - Tokens added per second
    /// * `capacity` - Maximum token capacity (burst size)
    pub fn new(rate: f32, capacity: f32) -> Self {
        Self {
            tokens: capacity,
            last_check: Instant::now(),
            rate,
            capacity,
        }
    }

    /// Check if an event can be processed.
    ///
    /// Returns `true` if the event is allowed (token consumed),
    /// `false` if rate limit exceeded.
    pub fn check(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_check).as_secs_f32();
        self.last_check = now;

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
