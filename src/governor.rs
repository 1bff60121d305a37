//! Request Governor
//!
//! Sliding-window admission control over a rolling 60 second interval. A
//! rejected request is not queued or retried; the caller surfaces the
//! rejection and stops.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Width of the rolling admission window
pub const RATE_WINDOW: Duration = Duration::from_millis(60_000);

/// Request-issue instants inside the current window, oldest first
#[derive(Debug, Default)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.timestamps.front() {
            if now.duration_since(*oldest) >= RATE_WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-plan sliding-window rate limiter
#[derive(Debug, Default)]
pub struct RequestGovernor {
    window: Mutex<RateWindow>,
}

impl RequestGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject one request against `plan_limit` requests per minute.
    ///
    /// `None` or `Some(0)` means unlimited: the request is admitted without
    /// touching the window.
    pub fn admit(&self, plan_limit: Option<u32>) -> bool {
        let limit = match plan_limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => return true,
        };

        let now = Instant::now();
        let mut window = self.window.lock();
        window.prune(now);

        if window.timestamps.len() >= limit {
            warn!(
                in_window = window.timestamps.len(),
                limit, "Request rejected by rate governor"
            );
            return false;
        }

        window.timestamps.push_back(now);
        debug!(
            in_window = window.timestamps.len(),
            limit, "Request admitted by rate governor"
        );
        true
    }

    /// Number of admitted requests still inside the window.
    pub fn in_window(&self) -> usize {
        let mut window = self.window.lock();
        window.prune(Instant::now());
        window.timestamps.len()
    }
}
