use reqwest::Response;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Tracks GitHub's rate-limit headers and blocks until the reported reset
/// when the quota is exhausted.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

struct RateLimitState {
    remaining: u32,
    reset_at: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: 60,
                reset_at: None,
            }),
        }
    }

    pub async fn wait(&self) {
        let wait_duration = {
            let state = self.state.lock().await;
            match (state.remaining, state.reset_at) {
                (0, Some(reset_at)) if reset_at > Instant::now() => {
                    Some(reset_at - Instant::now())
                }
                _ => None,
            }
        };

        if let Some(duration) = wait_duration {
            tracing::info!("GitHub rate limited, waiting {:?}", duration);
            sleep(duration).await;
        }
    }

    pub async fn update_from_response(&self, response: &Response) {
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let Some(remaining) = remaining else {
            return;
        };

        let reset_at = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .and_then(|reset_timestamp| {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .ok()?
                    .as_secs();
                (reset_timestamp > now)
                    .then(|| Instant::now() + Duration::from_secs(reset_timestamp - now))
            });

        let mut state = self.state.lock().await;
        state.remaining = remaining;
        if reset_at.is_some() {
            state.reset_at = reset_at;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
