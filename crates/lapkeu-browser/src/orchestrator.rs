use crate::driver::{SiteDriver, SiteSession};
use crate::ratelimit::RateLimiter;
use crate::{Error, Result};
use lapkeu_core::{
    Config, FailReason, Finalize, FormSelection, Phase, PhaseOutcome, PhaseRun, ReportPeriod,
    extract_region,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Finalization is cheap to retry; extraction is not. One retry, then the
/// phase is marked failed without re-scraping.
const FINALIZE_ATTEMPTS: u32 = 2;

/// Runs phases through their state machine:
/// Init → SessionOpen → FormFilled → Submitted → Extracted → Finalized →
/// Closed, with terminal Failed | Closed.
///
/// Every phase gets a fresh session and a full selection sequence. Session
/// teardown runs on every exit path (success, failure and abort) before
/// results are handed to the finalizer.
pub struct Orchestrator<D, F> {
    driver: D,
    finalizer: F,
    limiter: Arc<RateLimiter>,
    config: Config,
    cancel: CancellationToken,
}

/// What one session attempt produced: terminal runs for some phases, and
/// the phases whose results region never appeared.
struct CycleAttempt {
    completed: Vec<PhaseRun>,
    stalled: Vec<Phase>,
}

impl<D: SiteDriver, F: Finalize> Orchestrator<D, F> {
    pub fn new(
        driver: D,
        finalizer: F,
        limiter: Arc<RateLimiter>,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            finalizer,
            limiter,
            config,
            cancel,
        }
    }

    /// Run one single phase in its own session.
    pub async fn run_phase(&self, period: ReportPeriod, phase: Phase) -> Result<PhaseRun> {
        if phase == Phase::All {
            return Err(Error::Unsupported(
                "phase 'all' runs via run_all_phases".into(),
            ));
        }
        let mut runs = self.run_cycle(period, &[phase]).await?;
        Ok(runs.remove(0))
    }

    /// Run every phase for the period, reporting all outcomes. One failed
    /// phase never aborts the rest; the output sheets are independent.
    ///
    /// First always runs isolated and its session is closed before anything
    /// else starts. Second and Third share one session, the documented
    /// exception to the fresh-session rule.
    pub async fn run_all_phases(&self, period: Option<ReportPeriod>) -> Result<Vec<PhaseRun>> {
        let period = period.unwrap_or_else(ReportPeriod::current);
        tracing::info!("Running all phases for {}", period);

        let mut runs = Vec::with_capacity(3);
        runs.push(self.run_phase(period, Phase::First).await?);

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        runs.extend(self.run_cycle(period, &[Phase::Second, Phase::Third]).await?);
        Ok(runs)
    }

    /// Drive the given phases through shared sessions until every one has a
    /// terminal outcome. Retried sessions only re-select the categories of
    /// phases that are still pending, so completed results are never
    /// re-scraped.
    async fn run_cycle(&self, period: ReportPeriod, phases: &[Phase]) -> Result<Vec<PhaseRun>> {
        self.limiter.begin_phase();

        let mut done: Vec<PhaseRun> = Vec::new();
        let mut pending: Vec<Phase> = phases.to_vec();
        let mut attempts = 0u32;

        while !pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            attempts += 1;
            let selection = selection_for(period, &pending);

            match self.attempt_cycle(period, &selection, &pending, attempts).await {
                Ok(attempt) => {
                    done.extend(attempt.completed);
                    pending = attempt.stalled;
                    if pending.is_empty() {
                        self.limiter.record_success();
                        break;
                    }
                    // Submitted, but neither results nor a no-data notice
                    // showed up. That is the rate-limit signature.
                    tracing::warn!(
                        "no results signal for {} phase(s); suspecting rate limiting",
                        pending.len()
                    );
                    if !self
                        .backoff_or_give_up(period, &selection, &mut pending, &mut done, attempts)
                        .await?
                    {
                        break;
                    }
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(Error::ElementNotFound(what)) => {
                    tracing::error!("Required field missing, phase-fatal: {}", what);
                    fail_pending(
                        &mut done,
                        &mut pending,
                        period,
                        &selection,
                        attempts,
                        FailReason::ElementNotFound,
                    );
                }
                Err(Error::SyncTimeout(what)) => {
                    tracing::warn!("Sync timeout during selection: {}", what);
                    if self.limiter.record_sync_timeout() {
                        if !self
                            .backoff_or_give_up(
                                period,
                                &selection,
                                &mut pending,
                                &mut done,
                                attempts,
                            )
                            .await?
                        {
                            break;
                        }
                    } else if attempts >= self.config.phase_retries {
                        fail_pending(
                            &mut done,
                            &mut pending,
                            period,
                            &selection,
                            attempts,
                            FailReason::SyncTimeout,
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!("Session failure: {}", err);
                    if attempts >= self.config.phase_retries {
                        fail_pending(
                            &mut done,
                            &mut pending,
                            period,
                            &selection,
                            attempts,
                            err.fail_reason(),
                        );
                    }
                }
            }
        }

        self.finalize_runs(&mut done);
        order_runs(&mut done, phases);
        Ok(done)
    }

    /// One session attempt. Teardown always executes, including ahead of a
    /// propagating abort.
    async fn attempt_cycle(
        &self,
        period: ReportPeriod,
        selection: &FormSelection,
        phases: &[Phase],
        attempts: u32,
    ) -> Result<CycleAttempt> {
        let signature = self.limiter.signature();
        let mut session = self.driver.open(&signature).await?;

        let outcome = self
            .drive_session(&mut session, period, selection, phases, attempts)
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!("Session teardown failed: {}", e);
        }

        outcome
    }

    async fn drive_session(
        &self,
        session: &mut D::Session,
        period: ReportPeriod,
        selection: &FormSelection,
        phases: &[Phase],
        attempts: u32,
    ) -> Result<CycleAttempt> {
        session.apply(selection).await?;
        session.submit().await?;

        let mut attempt = CycleAttempt {
            completed: Vec::new(),
            stalled: Vec::new(),
        };

        for &phase in phases {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let category = phase.category().expect("cycles only carry single phases");

            match session.wait_results(category).await {
                Ok(Some(markup)) => {
                    let result = extract_region(&markup);
                    let outcome = if result.table_found {
                        PhaseOutcome::Success
                    } else {
                        PhaseOutcome::NoData
                    };
                    tracing::info!(
                        "Phase {}: {} ({} rows)",
                        phase,
                        outcome,
                        result.row_count()
                    );
                    attempt.completed.push(PhaseRun {
                        phase,
                        period,
                        selection: selection.clone(),
                        result,
                        attempts,
                        outcome,
                    });
                }
                Ok(None) => {
                    tracing::info!("Phase {}: no data", phase);
                    attempt.completed.push(PhaseRun {
                        phase,
                        period,
                        selection: selection.clone(),
                        result: Default::default(),
                        attempts,
                        outcome: PhaseOutcome::NoData,
                    });
                }
                Err(Error::SyncTimeout(what)) => {
                    tracing::warn!("Results stalled for phase {}: {}", phase, what);
                    attempt.stalled.push(phase);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(attempt)
    }

    /// One backoff-and-restart cycle after suspected rate limiting. Returns
    /// false once the budget is exhausted; pending phases are then failed as
    /// rate limited.
    async fn backoff_or_give_up(
        &self,
        period: ReportPeriod,
        selection: &FormSelection,
        pending: &mut Vec<Phase>,
        done: &mut Vec<PhaseRun>,
        attempts: u32,
    ) -> Result<bool> {
        match self.limiter.next_backoff() {
            Some(wait) => {
                self.limiter.rotate_signature();
                tracing::warn!(
                    "Backing off {:?} and rotating client signature before restart",
                    wait
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                Ok(true)
            }
            None => {
                tracing::error!(
                    "Rate-limit retry budget exhausted; failing {} phase(s)",
                    pending.len()
                );
                fail_pending(
                    done,
                    pending,
                    period,
                    selection,
                    attempts,
                    FailReason::RateLimited,
                );
                Ok(false)
            }
        }
    }

    /// Hand successful extractions to the finalizer. Sessions are already
    /// closed when this runs. Only the handoff is retried; a run whose
    /// finalization keeps failing flips to `Failed(Finalization)` with its
    /// extracted rows kept.
    fn finalize_runs(&self, runs: &mut [PhaseRun]) {
        for run in runs.iter_mut() {
            if run.outcome != PhaseOutcome::Success {
                continue;
            }

            let mut failed = None;
            for attempt in 1..=FINALIZE_ATTEMPTS {
                match self.finalizer.finalize(run.phase, run.period, &run.result) {
                    Ok(()) => {
                        failed = None;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Finalization attempt {} failed for phase {}: {}",
                            attempt,
                            run.phase,
                            e
                        );
                        failed = Some(e);
                    }
                }
            }
            if failed.is_some() {
                run.outcome = PhaseOutcome::Failed(FailReason::Finalization);
            }
        }
    }
}

/// Selection covering exactly the pending phases' categories.
fn selection_for(period: ReportPeriod, pending: &[Phase]) -> FormSelection {
    FormSelection {
        period,
        categories: pending.iter().filter_map(Phase::category).collect(),
    }
}

fn fail_pending(
    done: &mut Vec<PhaseRun>,
    pending: &mut Vec<Phase>,
    period: ReportPeriod,
    selection: &FormSelection,
    attempts: u32,
    reason: FailReason,
) {
    for phase in pending.drain(..) {
        done.push(PhaseRun::failed(
            phase,
            period,
            selection.clone(),
            attempts,
            reason,
        ));
    }
}

/// Report runs in the caller's phase order regardless of completion order.
fn order_runs(runs: &mut [PhaseRun], phases: &[Phase]) {
    runs.sort_by_key(|run| {
        phases
            .iter()
            .position(|p| *p == run.phase)
            .unwrap_or(usize::MAX)
    });
}
