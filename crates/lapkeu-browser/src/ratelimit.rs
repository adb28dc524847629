use lapkeu_core::Config;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-wide rate-limit and retry state.
///
/// The server observes load across the whole run, so request counts and the
/// cool-down clock live here for the lifetime of the process and are shared
/// by every phase. Per-phase state (timeout streak, backoff budget) is reset
/// by `begin_phase`.
pub struct RateLimiter {
    delay_min: Duration,
    delay_max: Duration,
    backoff_base: Duration,
    backoff_max: Duration,
    backoff_budget: u32,
    streak_threshold: u32,
    user_agents: Vec<String>,
    state: Mutex<State>,
}

struct State {
    requests: u64,
    started: Instant,
    timeout_streak: u32,
    backoffs_taken: u32,
    signature_index: usize,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        Self {
            delay_min: Duration::from_millis(config.delay_min_ms),
            delay_max: Duration::from_millis(config.delay_max_ms),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
            backoff_budget: config.backoff_attempts,
            streak_threshold: config.timeout_streak_threshold.max(1),
            user_agents: config.user_agents.clone(),
            state: Mutex::new(State {
                requests: 0,
                started: Instant::now(),
                timeout_streak: 0,
                backoffs_taken: 0,
                signature_index: 0,
            }),
        }
    }

    /// Randomized delay before a field-changing action, so request spacing
    /// never looks mechanical.
    pub async fn pause_before_action(&self) {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.requests += 1;
            self.pick_delay()
        };
        tokio::time::sleep(delay).await;
    }

    fn pick_delay(&self) -> Duration {
        let min = self.delay_min.as_millis() as u64;
        let max = self.delay_max.as_millis() as u64;
        Duration::from_millis(if max > min {
            fastrand::u64(min..=max)
        } else {
            min
        })
    }

    /// Reset per-phase detection state. Process-wide counters keep running.
    pub fn begin_phase(&self) {
        let mut state = self.state.lock().unwrap();
        state.timeout_streak = 0;
        state.backoffs_taken = 0;
    }

    /// Record one sync timeout. Returns true when the consecutive streak
    /// crosses the threshold, and only then: N timeouts fund one
    /// backoff-and-restart cycle rather than N.
    pub fn record_sync_timeout(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.timeout_streak += 1;
        if state.timeout_streak >= self.streak_threshold {
            state.timeout_streak = 0;
            return true;
        }
        false
    }

    /// A completed synchronization clears the streak.
    pub fn record_success(&self) {
        self.state.lock().unwrap().timeout_streak = 0;
    }

    /// Next exponential backoff, or `None` once the budget is spent.
    pub fn next_backoff(&self) -> Option<Duration> {
        let mut state = self.state.lock().unwrap();
        if state.backoffs_taken >= self.backoff_budget {
            return None;
        }
        let wait = self
            .backoff_base
            .saturating_mul(1u32 << state.backoffs_taken.min(16))
            .min(self.backoff_max);
        state.backoffs_taken += 1;
        Some(wait)
    }

    /// Current outward-facing client signature.
    pub fn signature(&self) -> String {
        let state = self.state.lock().unwrap();
        self.user_agents[state.signature_index % self.user_agents.len()].clone()
    }

    /// Rotate to the next client signature and return it.
    pub fn rotate_signature(&self) -> String {
        let mut state = self.state.lock().unwrap();
        state.signature_index = (state.signature_index + 1) % self.user_agents.len();
        self.user_agents[state.signature_index].clone()
    }

    pub fn requests(&self) -> u64 {
        self.state.lock().unwrap().requests
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().unwrap().started.elapsed()
    }
}
