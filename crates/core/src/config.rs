//! Tunables for one control session.
//!
//! Defaults reflect the behavior the rest of the crate is written against;
//! tests override individual fields rather than constructing from scratch.

use std::time::Duration;

/// Configuration for one control session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote debugging port of the host process.
    pub port: u16,
    /// URL fragments identifying the primary application's own surfaces.
    /// Tabs matching any of these are internal; they also rank first during
    /// target reselection.
    pub primary_url_patterns: Vec<String>,
    /// How long a health probe result stays valid.
    pub health_ttl: Duration,
    /// Maximum transient-failure retries before an operation gives up.
    pub attempt_budget: u32,
    /// First reconnect backoff delay.
    pub backoff_base: Duration,
    /// Multiplier applied to the backoff per attempt.
    pub backoff_factor: f64,
    /// Upper bound on any single backoff delay.
    pub backoff_cap: Duration,
    /// Interval between status reads in the polling loop.
    pub poll_interval: Duration,
    /// Consecutive poll failures tolerated before a hard recovery.
    pub poll_error_budget: u32,
    /// Consecutive identical non-trivial reads that mark a response stable.
    pub stability_threshold: u32,
    /// Minimum extracted-text length considered substantial.
    pub min_substantial_len: usize,
    /// Hard cap on sanitized response length, in characters.
    pub response_cap: usize,
    /// Sleep between checks while another caller's reconnect is in flight.
    pub reconnect_wait_interval: Duration,
    /// Maximum number of those checks before giving up the wait.
    pub reconnect_wait_attempts: u32,
    /// Settling delay between submission fallback steps.
    pub submit_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9222,
            primary_url_patterns: vec!["claude.ai".to_string(), "chatgpt.com".to_string()],
            health_ttl: Duration::from_secs(2),
            attempt_budget: 10,
            backoff_base: Duration::from_millis(300),
            backoff_factor: 1.3,
            backoff_cap: Duration::from_secs(2),
            poll_interval: Duration::from_millis(1500),
            poll_error_budget: 5,
            stability_threshold: 2,
            min_substantial_len: 50,
            response_cap: 8000,
            reconnect_wait_interval: Duration::from_millis(100),
            reconnect_wait_attempts: 50,
            submit_settle: Duration::from_millis(400),
        }
    }
}

impl Config {
    /// Backoff delay before retry number `attempt` (0-based), exponential
    /// with a hard cap.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_base.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped = scaled.min(self.backoff_cap.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Returns true when `url` belongs to the primary application.
    pub fn matches_primary(&self, url: &str) -> bool {
        self.primary_url_patterns.iter().any(|p| url.contains(p))
    }
}
