//! Rolling-window rate limiter.
//!
//! Two ceilings are tracked independently: starts within the last 60 seconds
//! and starts within the last 24 hours. Every network attempt takes one unit of
//! both. The daily ceiling fails fast; the per-minute ceiling lets a call wait
//! for the oldest start to leave the window, up to a caller-supplied bound.

use crate::config::RateLimits;
use crate::error::{Ceiling, DispatchError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Per-minute window is full; a slot frees after this long.
    Wait(Duration),
}

#[derive(Debug, Default)]
struct Windows {
    minute: VecDeque<Instant>,
    day: VecDeque<Instant>,
    granted: u64,
}

impl Windows {
    fn prune(&mut self, now: Instant) {
        while self.minute.front().is_some_and(|t| now.duration_since(*t) >= MINUTE) {
            self.minute.pop_front();
        }
        while self.day.front().is_some_and(|t| now.duration_since(*t) >= DAY) {
            self.day.pop_front();
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Attempt to take one unit of budget at `now`.
    pub fn try_acquire(&self, now: Instant) -> Result<Admission, DispatchError> {
        let mut w = self.windows.lock();
        w.prune(now);

        if w.day.len() >= self.limits.per_day as usize {
            return Err(DispatchError::RateLimitExceeded {
                ceiling: Ceiling::PerDay,
                limit: self.limits.per_day,
            });
        }
        if w.minute.len() >= self.limits.per_minute as usize {
            let oldest = w.minute.front().copied().unwrap_or(now);
            let frees_at = oldest + MINUTE;
            return Ok(Admission::Wait(frees_at.saturating_duration_since(now)));
        }

        w.minute.push_back(now);
        w.day.push_back(now);
        w.granted += 1;
        Ok(Admission::Granted)
    }

    /// Take one unit of budget, waiting at most `max_wait` for a per-minute slot.
    pub async fn acquire(&self, max_wait: Duration) -> Result<(), DispatchError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let now = Instant::now();
            match self.try_acquire(now)? {
                Admission::Granted => return Ok(()),
                Admission::Wait(wait) => {
                    if now + wait > deadline {
                        return Err(DispatchError::RateLimitExceeded {
                            ceiling: Ceiling::PerMinute,
                            limit: self.limits.per_minute,
                        });
                    }
                    tracing::debug!(wait_ms = wait.as_millis() as u64, "per-minute window full");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Total units granted so far.
    pub fn granted(&self) -> u64 {
        self.windows.lock().granted
    }

    /// Units remaining in the daily window at `now`.
    pub fn remaining_today(&self, now: Instant) -> u32 {
        let mut w = self.windows.lock();
        w.prune(now);
        self.limits.per_day.saturating_sub(w.day.len() as u32)
    }
}
