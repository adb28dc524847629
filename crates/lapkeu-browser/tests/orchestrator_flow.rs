use async_trait::async_trait;
use lapkeu_browser::{Error, Orchestrator, RateLimiter, Result, SiteDriver, SiteSession};
use lapkeu_core::{
    Config, ExtractionResult, FailReason, Finalize, FinalizeError, FormSelection, Phase,
    PhaseOutcome, ReportCategory, ReportPeriod,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const ROWS: &str = "<table><tr><td>Kas</td><td>10</td></tr></table>";
const EMPTY_REGION: &str = "<div class=\"grid\"></div>";

#[derive(Clone)]
enum Results {
    /// Region renders with table rows.
    Rows,
    /// Region renders but holds no rows.
    Empty,
    /// Site shows its explicit no-data notice.
    NoData,
    /// Neither signal appears within the timeout.
    Stall,
}

#[derive(Clone)]
enum Script {
    Session(HashMap<ReportCategory, Results>),
    ApplyElementNotFound,
    ApplyTimeout,
    OpenFailure,
}

fn session_script(behaviors: &[(ReportCategory, Results)]) -> Script {
    Script::Session(behaviors.iter().cloned().collect())
}

/// Scripted site: each `open` consumes the next script, falling back to the
/// default. Counters verify that every opened session is torn down.
struct ScriptedDriver {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    opened: Arc<AtomicU32>,
    closed: Arc<AtomicU32>,
    applied: Arc<Mutex<Vec<FormSelection>>>,
}

impl ScriptedDriver {
    fn new(fallback: Script) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            fallback,
            opened: Arc::new(AtomicU32::new(0)),
            closed: Arc::new(AtomicU32::new(0)),
            applied: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn queue(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }
}

struct ScriptedSession {
    script: Script,
    closed: Arc<AtomicU32>,
    applied: Arc<Mutex<Vec<FormSelection>>>,
}

#[async_trait]
impl SiteDriver for ScriptedDriver {
    type Session = ScriptedSession;

    async fn open(&self, _signature: &str) -> Result<ScriptedSession> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if matches!(script, Script::OpenFailure) {
            return Err(Error::SessionCrash("chrome exited during startup".into()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            script,
            closed: Arc::clone(&self.closed),
            applied: Arc::clone(&self.applied),
        })
    }
}

#[async_trait]
impl SiteSession for ScriptedSession {
    async fn apply(&mut self, selection: &FormSelection) -> Result<()> {
        self.applied.lock().unwrap().push(selection.clone());
        match &self.script {
            Script::ApplyElementNotFound => Err(Error::ElementNotFound("[id*=ddlBulan]".into())),
            Script::ApplyTimeout => Err(Error::SyncTimeout("[id*=ddlTahun]".into())),
            _ => Ok(()),
        }
    }

    async fn submit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait_results(&mut self, category: ReportCategory) -> Result<Option<String>> {
        let behaviors = match &self.script {
            Script::Session(behaviors) => behaviors,
            _ => unreachable!("apply failures never reach extraction"),
        };
        match behaviors.get(&category).cloned().unwrap_or(Results::Stall) {
            Results::Rows => Ok(Some(ROWS.to_string())),
            Results::Empty => Ok(Some(EMPTY_REGION.to_string())),
            Results::NoData => Ok(None),
            Results::Stall => Err(Error::SyncTimeout(format!("results for {}", category))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone)]
struct CountingFinalizer {
    calls: Arc<Mutex<Vec<Phase>>>,
    fail: bool,
}

impl CountingFinalizer {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Finalize for CountingFinalizer {
    fn finalize(
        &self,
        phase: Phase,
        _period: ReportPeriod,
        _result: &ExtractionResult,
    ) -> std::result::Result<(), FinalizeError> {
        self.calls.lock().unwrap().push(phase);
        if self.fail {
            Err(FinalizeError::Io(std::io::Error::other("disk full")))
        } else {
            Ok(())
        }
    }
}

fn test_config() -> Config {
    Config {
        delay_min_ms: 0,
        delay_max_ms: 0,
        backoff_base_secs: 0,
        backoff_max_secs: 0,
        backoff_attempts: 2,
        phase_retries: 3,
        timeout_streak_threshold: 2,
        ..Config::default()
    }
}

fn orchestrator(
    driver: ScriptedDriver,
    finalizer: CountingFinalizer,
    config: Config,
) -> Orchestrator<ScriptedDriver, CountingFinalizer> {
    orchestrator_with_cancel(driver, finalizer, config, CancellationToken::new())
}

fn orchestrator_with_cancel(
    driver: ScriptedDriver,
    finalizer: CountingFinalizer,
    config: Config,
    cancel: CancellationToken,
) -> Orchestrator<ScriptedDriver, CountingFinalizer> {
    let limiter = Arc::new(RateLimiter::new(&config));
    Orchestrator::new(driver, finalizer, limiter, config, cancel)
}

fn period() -> ReportPeriod {
    ReportPeriod::new(12, 2024).unwrap()
}

#[tokio::test]
async fn test_run_all_reports_every_outcome_and_finalizes_selectively() {
    // First succeeds, Second's results never render, Third succeeds.
    let behaviors = session_script(&[
        (ReportCategory::BalanceSheet, Results::Rows),
        (ReportCategory::IncomeStatement, Results::Stall),
        (ReportCategory::AssetQuality, Results::Rows),
    ]);
    let driver = ScriptedDriver::new(behaviors);
    let opened = Arc::clone(&driver.opened);
    let closed = Arc::clone(&driver.closed);
    let finalizer = CountingFinalizer::new();
    let calls = Arc::clone(&finalizer.calls);

    let runs = orchestrator(driver, finalizer, test_config())
        .run_all_phases(Some(period()))
        .await
        .unwrap();

    let outcomes: Vec<_> = runs.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            PhaseOutcome::Success,
            PhaseOutcome::Failed(FailReason::RateLimited),
            PhaseOutcome::Success,
        ]
    );

    // The finalizer ran for exactly the two successful phases.
    assert_eq!(*calls.lock().unwrap(), vec![Phase::First, Phase::Third]);

    // Every opened session was torn down.
    assert_eq!(
        opened.load(Ordering::SeqCst),
        closed.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_shared_pair_retries_only_pending_categories() {
    let behaviors = session_script(&[
        (ReportCategory::BalanceSheet, Results::Rows),
        (ReportCategory::IncomeStatement, Results::Stall),
        (ReportCategory::AssetQuality, Results::Rows),
    ]);
    let driver = ScriptedDriver::new(behaviors);
    let applied = Arc::clone(&driver.applied);

    orchestrator(driver, CountingFinalizer::new(), test_config())
        .run_all_phases(Some(period()))
        .await
        .unwrap();

    let selections = applied.lock().unwrap();
    // First phase alone, then the shared pair, then restarts that only
    // re-select the still-pending category.
    assert_eq!(
        selections[0].categories,
        vec![ReportCategory::BalanceSheet]
    );
    assert_eq!(
        selections[1].categories,
        vec![
            ReportCategory::IncomeStatement,
            ReportCategory::AssetQuality,
        ]
    );
    for selection in &selections[2..] {
        assert_eq!(
            selection.categories,
            vec![ReportCategory::IncomeStatement]
        );
    }
}

#[tokio::test]
async fn test_no_data_notice_is_an_outcome_not_an_error() {
    let driver = ScriptedDriver::new(session_script(&[(
        ReportCategory::IncomeStatement,
        Results::NoData,
    )]));
    let finalizer = CountingFinalizer::new();
    let calls = Arc::clone(&finalizer.calls);

    let run = orchestrator(driver, finalizer, test_config())
        .run_phase(period(), Phase::Second)
        .await
        .unwrap();

    assert_eq!(run.outcome, PhaseOutcome::NoData);
    assert_eq!(run.attempts, 1);
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rendered_but_rowless_region_counts_as_no_data() {
    let driver = ScriptedDriver::new(session_script(&[(
        ReportCategory::BalanceSheet,
        Results::Empty,
    )]));

    let run = orchestrator(driver, CountingFinalizer::new(), test_config())
        .run_phase(period(), Phase::First)
        .await
        .unwrap();

    assert_eq!(run.outcome, PhaseOutcome::NoData);
    assert!(!run.result.table_found);
}

#[tokio::test]
async fn test_missing_required_field_is_phase_fatal() {
    let driver = ScriptedDriver::new(Script::ApplyElementNotFound);
    let opened = Arc::clone(&driver.opened);
    let closed = Arc::clone(&driver.closed);

    let run = orchestrator(driver, CountingFinalizer::new(), test_config())
        .run_phase(period(), Phase::First)
        .await
        .unwrap();

    assert_eq!(
        run.outcome,
        PhaseOutcome::Failed(FailReason::ElementNotFound)
    );
    assert_eq!(run.attempts, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_crash_retries_with_a_fresh_session() {
    let driver = ScriptedDriver::new(session_script(&[(
        ReportCategory::BalanceSheet,
        Results::Rows,
    )]))
    .queue(Script::OpenFailure);

    let run = orchestrator(driver, CountingFinalizer::new(), test_config())
        .run_phase(period(), Phase::First)
        .await
        .unwrap();

    assert_eq!(run.outcome, PhaseOutcome::Success);
    assert_eq!(run.attempts, 2);
}

#[tokio::test]
async fn test_selection_timeouts_exhaust_the_retry_budget() {
    // A high streak threshold keeps rate-limit suspicion out of the way.
    let config = Config {
        timeout_streak_threshold: 10,
        ..test_config()
    };
    let driver = ScriptedDriver::new(Script::ApplyTimeout);
    let opened = Arc::clone(&driver.opened);
    let closed = Arc::clone(&driver.closed);

    let run = orchestrator(driver, CountingFinalizer::new(), config.clone())
        .run_phase(period(), Phase::Third)
        .await
        .unwrap();

    assert_eq!(run.outcome, PhaseOutcome::Failed(FailReason::SyncTimeout));
    assert_eq!(run.attempts, config.phase_retries);
    assert_eq!(
        opened.load(Ordering::SeqCst),
        closed.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_timeout_streak_escalates_to_rate_limited() {
    let config = Config {
        timeout_streak_threshold: 1,
        backoff_attempts: 1,
        ..test_config()
    };
    let driver = ScriptedDriver::new(Script::ApplyTimeout);

    let run = orchestrator(driver, CountingFinalizer::new(), config)
        .run_phase(period(), Phase::Second)
        .await
        .unwrap();

    // One backoff-and-restart cycle, then the budget is gone.
    assert_eq!(run.outcome, PhaseOutcome::Failed(FailReason::RateLimited));
    assert_eq!(run.attempts, 2);
}

#[tokio::test]
async fn test_finalization_failure_flips_outcome_but_keeps_rows() {
    let driver = ScriptedDriver::new(session_script(&[(
        ReportCategory::BalanceSheet,
        Results::Rows,
    )]));
    let finalizer = CountingFinalizer::failing();
    let calls = Arc::clone(&finalizer.calls);

    let run = orchestrator(driver, finalizer, test_config())
        .run_phase(period(), Phase::First)
        .await
        .unwrap();

    assert_eq!(run.outcome, PhaseOutcome::Failed(FailReason::Finalization));
    assert!(run.result.table_found);
    // Finalization only is retried; extraction is not repeated.
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_aborts_before_opening_a_session() {
    let driver = ScriptedDriver::new(session_script(&[(
        ReportCategory::BalanceSheet,
        Results::Rows,
    )]));
    let opened = Arc::clone(&driver.opened);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = orchestrator_with_cancel(driver, CountingFinalizer::new(), test_config(), cancel)
        .run_phase(period(), Phase::First)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_phase_rejects_the_all_pseudo_phase() {
    let driver = ScriptedDriver::new(session_script(&[]));

    let result = orchestrator(driver, CountingFinalizer::new(), test_config())
        .run_phase(period(), Phase::All)
        .await;

    assert!(matches!(result, Err(Error::Unsupported(_))));
}
