use std::collections::HashMap;
use std::time::Duration;

use leadbook_core::UserId;

/// Fixed-window counter of create operations per caller.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window_ms: u64,
    windows: HashMap<UserId, Window>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_ms: u64,
    count: u32,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: window.as_millis() as u64,
            windows: HashMap::new(),
        }
    }

    /// Count one attempt for `user` at `now_ms`. Returns `Err(retry_after_ms)`
    /// once the caller has used up the current window.
    pub fn check(&mut self, user: UserId, now_ms: u64) -> Result<(), u64> {
        let window_ms = self.window_ms;
        let window = self.windows.entry(user).or_insert(Window {
            started_ms: now_ms,
            count: 0,
        });
        if now_ms.saturating_sub(window.started_ms) >= window_ms {
            *window = Window {
                started_ms: now_ms,
                count: 0,
            };
        }
        if window.count >= self.limit {
            let elapsed = now_ms.saturating_sub(window.started_ms);
            return Err(window_ms.saturating_sub(elapsed).max(1));
        }
        window.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed.
    pub fn prune(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        self.windows
            .retain(|_, w| now_ms.saturating_sub(w.started_ms) < window_ms);
    }
}
