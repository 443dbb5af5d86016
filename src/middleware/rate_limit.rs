use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    served: u32,
}

/// Fixed one-second window limiter shared across all API routes.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_rps: u32,
    window: Arc<Mutex<Window>>,
}

impl RateLimiter {
    fn new(max_rps: u32) -> Self {
        Self {
            max_rps: max_rps.max(1),
            window: Arc::new(Mutex::new(Window {
                opened_at: Instant::now(),
                served: 0,
            })),
        }
    }

    fn try_acquire(&self) -> bool {
        let mut window = self.window.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        if now.duration_since(window.opened_at) >= Duration::from_secs(1) {
            window.opened_at = now;
            window.served = 0;
        }
        if window.served < self.max_rps {
            window.served += 1;
            true
        } else {
            false
        }
    }
}

pub fn new_rps_state(max_rps: u32) -> RateLimiter {
    RateLimiter::new(max_rps)
}

pub async fn rps_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.try_acquire() {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}
