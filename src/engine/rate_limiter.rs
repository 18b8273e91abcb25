use crate::config::RateLimitConfig;
use rand::Rng;
use std::time::{Duration, Instant};

/// What a source should do after a throttle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Wait at least this long, then retry the same request
    Retry(Duration),
    /// The consecutive-throttle budget for this URL is spent
    GiveUp,
}

/// Request pacing and adaptive backoff for one source within one run
///
/// The current delay starts at the baseline, doubles on every throttle up to
/// the ceiling, and is halved back toward the baseline at most once per
/// `relax_after_successes` successes. A limiter is never shared between runs.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    baseline: Duration,
    ceiling: Duration,
    current: Duration,
    jitter_ms: u64,

    max_consecutive_throttles: u32,
    relax_after_successes: u32,

    /// Throttles seen for the current URL without an intervening success
    consecutive_throttles: u32,

    /// Successes since the delay was last halved (or last raised)
    successes_since_relax: u32,

    /// When the previous request was allowed to go out
    last_request_time: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let baseline = Duration::from_millis(config.baseline_ms);
        let ceiling = Duration::from_millis(config.ceiling_ms.max(config.baseline_ms));

        Self {
            baseline,
            ceiling,
            current: baseline,
            jitter_ms: config.jitter_ms,
            max_consecutive_throttles: config.max_consecutive_throttles.max(1),
            relax_after_successes: config.relax_after_successes.max(1),
            consecutive_throttles: 0,
            successes_since_relax: 0,
            last_request_time: None,
        }
    }

    /// Returns how long to wait before the next request may be issued
    ///
    /// The first request of a run goes out immediately; afterwards requests
    /// are spaced by the current delay measured from the previous one.
    pub fn before_request(&mut self, now: Instant) -> Duration {
        let wait = match self.last_request_time {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                self.current.saturating_sub(elapsed) + self.jitter()
            }
            None => Duration::ZERO,
        };

        self.last_request_time = Some(now + wait);
        wait
    }

    /// Records a throttle signal (HTTP 429, CAPTCHA page, timeout)
    pub fn on_throttled(&mut self) -> ThrottleDecision {
        self.consecutive_throttles += 1;
        self.successes_since_relax = 0;
        self.current = (self.current * 2).min(self.ceiling);

        if self.consecutive_throttles >= self.max_consecutive_throttles {
            tracing::debug!(
                "Throttled {} times in a row, giving up on this URL",
                self.consecutive_throttles
            );
            ThrottleDecision::GiveUp
        } else {
            ThrottleDecision::Retry(self.current)
        }
    }

    /// Records a successful request
    pub fn on_success(&mut self) {
        self.consecutive_throttles = 0;

        if self.current <= self.baseline {
            self.successes_since_relax = 0;
            return;
        }

        self.successes_since_relax += 1;
        if self.successes_since_relax >= self.relax_after_successes {
            self.current = (self.current / 2).max(self.baseline);
            self.successes_since_relax = 0;
            tracing::debug!("Relaxed request delay to {:?}", self.current);
        }
    }

    /// Starts the throttle budget for a new URL
    pub fn begin_item(&mut self) {
        self.consecutive_throttles = 0;
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }

    pub fn consecutive_throttles(&self) -> u32 {
        self.consecutive_throttles
    }

    fn jitter(&self) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
    }
}
