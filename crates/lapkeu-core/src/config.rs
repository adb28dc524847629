use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration with working defaults.
///
/// All knobs can be overridden from a JSON file; anything absent falls back
/// to the default. Delay and backoff values exist to stay under the site's
/// undocumented request-rate ceiling, so lowering them is at your own risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Report form entry point.
    pub report_url: String,
    /// Upper bound for one synchronization wait (postback settle).
    pub sync_timeout_secs: u64,
    /// Upper bound for the conditional results container after submit.
    pub results_timeout_secs: u64,
    /// How long to watch for anchor staleness before falling back to
    /// polling the next-state predicate directly.
    pub stale_grace_ms: u64,
    /// Predicate polling interval.
    pub poll_interval_ms: u64,
    /// Fresh-session attempts per phase before the phase is marked failed.
    pub phase_retries: u32,
    /// Randomized pre-action delay window.
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Exponential backoff after suspected rate limiting.
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub backoff_attempts: u32,
    /// Consecutive sync timeouts before rate limiting is suspected.
    pub timeout_streak_threshold: u32,
    /// Workbook output root.
    pub output_dir: PathBuf,
    pub headless: bool,
    /// Explicit Chrome binary; platform defaults are probed when unset.
    pub chrome_path: Option<PathBuf>,
    /// Outward-facing client signatures, rotated on suspected rate limiting.
    pub user_agents: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_url:
                "https://cfs.ojk.go.id/cfs/Report.aspx?BankTypeCode=BPK&BankTypeName=BPR%20Konvensional"
                    .into(),
            sync_timeout_secs: 30,
            results_timeout_secs: 30,
            stale_grace_ms: 1_500,
            poll_interval_ms: 250,
            phase_retries: 3,
            delay_min_ms: 2_000,
            delay_max_ms: 3_000,
            backoff_base_secs: 5,
            backoff_max_secs: 300,
            backoff_attempts: 3,
            timeout_streak_threshold: 2,
            output_dir: PathBuf::from("output"),
            headless: true,
            chrome_path: None,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".into(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, filling gaps with defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_min_ms > self.delay_max_ms {
            return Err(Error::InvalidConfig(format!(
                "delay window inverted: {}ms > {}ms",
                self.delay_min_ms, self.delay_max_ms
            )));
        }
        if self.sync_timeout_secs == 0 || self.results_timeout_secs == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".into()));
        }
        if self.phase_retries == 0 {
            return Err(Error::InvalidConfig("phase_retries must be >= 1".into()));
        }
        if self.user_agents.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one user agent is required".into(),
            ));
        }
        Ok(())
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn results_timeout(&self) -> Duration {
        Duration::from_secs(self.results_timeout_secs)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_millis(self.stale_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}
