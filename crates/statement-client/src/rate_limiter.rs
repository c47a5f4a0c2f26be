use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const SLACK: Duration = Duration::from_millis(50);

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
pub struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Claim a slot at `now`, or report how long until the oldest request
    /// leaves the window.
    fn try_claim(&self, sent: &mut VecDeque<Instant>, now: Instant) -> Result<(), Duration> {
        while sent
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            sent.pop_front();
        }

        match sent.front() {
            Some(&oldest) if sent.len() >= self.max_requests => {
                Err((oldest + self.window).saturating_duration_since(now) + SLACK)
            }
            _ => {
                sent.push_back(now);
                Ok(())
            }
        }
    }

    /// Wait for a provider slot.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut sent = self.timestamps.lock().await;
                match self.try_claim(&mut sent, Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tracing::debug!("Provider rate limit reached, retrying in {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests currently counted against the window.
    pub async fn in_flight(&self) -> usize {
        let ts = self.timestamps.lock().await;
        let now = Instant::now();
        ts.iter().filter(|&&t| now.duration_since(t) < self.window).count()
    }
}
