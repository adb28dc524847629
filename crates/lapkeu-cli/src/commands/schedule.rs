use super::{build_orchestrator, load_config, print_summary};
use crate::{Cli, WeekdayArg};
use anyhow::{Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, Weekday};
use lapkeu_browser::Error as BrowserError;
use lapkeu_core::{FailReason, PhaseOutcome};
use std::time::Duration;

/// Extra cool-down before the next trigger after a rate-limited run, on top
/// of the regular cadence.
fn rate_limit_cooldown() -> ChronoDuration {
    ChronoDuration::hours(1)
}

/// Long-running weekly trigger for `run-all`.
///
/// The loop is strictly sequential, so at most one run is ever in flight. A
/// crash mid-run leaves nothing to resume: the next trigger starts a clean
/// run, and finalization is an idempotent upsert keyed by period.
pub async fn execute(cli: &Cli, weekday: WeekdayArg, at: &str) -> Result<()> {
    let config = load_config(cli)?;
    let weekday = Weekday::from(weekday);
    let at = NaiveTime::parse_from_str(at, "%H:%M")
        .with_context(|| format!("invalid time of day: {}", at))?;

    tracing::info!(
        "Scheduler started: run-all every {:?} at {}",
        weekday,
        at.format("%H:%M")
    );

    let mut extra_cooldown = ChronoDuration::zero();
    loop {
        let now = Local::now().naive_local();
        let fire_at = next_fire(now, weekday, at) + extra_cooldown;
        let wait = (fire_at - now)
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        tracing::info!("Next run at {}", fire_at.format("%Y-%m-%d %H:%M"));

        let (orchestrator, cancel) = build_orchestrator(&config);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Scheduler stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match orchestrator.run_all_phases(None).await {
            Ok(runs) => {
                print_summary(&runs);
                let rate_limited = runs
                    .iter()
                    .any(|r| r.outcome == PhaseOutcome::Failed(FailReason::RateLimited));
                extra_cooldown = if rate_limited {
                    tracing::warn!(
                        "Run was rate limited; delaying the next trigger by {} minutes",
                        rate_limit_cooldown().num_minutes()
                    );
                    rate_limit_cooldown()
                } else {
                    ChronoDuration::zero()
                };
            }
            Err(BrowserError::Cancelled) => {
                tracing::info!("Scheduler stopped during run");
                return Ok(());
            }
            Err(e) => {
                tracing::error!("Scheduled run failed: {}", e);
                extra_cooldown = ChronoDuration::zero();
            }
        }
    }
}

/// Next occurrence of `weekday` at `at`, strictly after `now`.
fn next_fire(now: NaiveDateTime, weekday: Weekday, at: NaiveTime) -> NaiveDateTime {
    let days_ahead = (weekday.num_days_from_monday() as i64 + 7
        - now.weekday().num_days_from_monday() as i64)
        % 7;
    let mut candidate = (now.date() + ChronoDuration::days(days_ahead)).and_time(at);
    if candidate <= now {
        candidate += ChronoDuration::days(7);
    }
    candidate
}
