use crate::limiter::RateLimiter;

// app's shared state
pub struct AppState {
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}
