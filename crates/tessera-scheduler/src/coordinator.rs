//! Worker pool coordination.
//!
//! A [`Coordinator`] owns one run: it builds the proxy pool and the work
//! distributor, starts a fixed set of named worker threads, reports progress
//! while they run, and joins them with a bounded timeout. With zero threads
//! the same loop runs in the calling thread.

use crate::control::{PauseDecision, PauseResolver, ProgressSink, RunControl};
use crate::distributor::WorkDistributor;
use crate::error::{Result, SchedulerError};
use crate::found::{FoundAccount, FoundList};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tessera_core::{
    AppConfig, CheckResult, CheckStatus, ProxyConfig, RunProgress, RunSummary, WorkItem,
};
use tessera_probe::ServiceChecker;
use tessera_proxy::{PinnedProxy, ProxyPool, ProxySource};
use tracing::{debug, error, info, warn};

const PAUSE_POLL: Duration = Duration::from_millis(100);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// Checks one candidate against every enabled service.
pub trait CandidateChecker: Send + Sync {
    /// Run all checks for `candidate`, optionally through `proxies`.
    fn check(&self, candidate: &str, proxies: Option<&dyn ProxySource>) -> Vec<CheckResult>;
}

impl CandidateChecker for ServiceChecker {
    fn check(&self, candidate: &str, proxies: Option<&dyn ProxySource>) -> Vec<CheckResult> {
        ServiceChecker::check(self, candidate, proxies)
    }
}

/// Tunables for one run.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunSettings {
    /// Worker threads; 0 runs sequentially in the calling thread
    pub threads: usize,
    /// Delay after each item, per worker
    pub delay: Duration,
    /// Pause and ask the resolver after each found result
    pub pause_on_found: bool,
    /// Start with pause prompts disabled
    pub auto_continue: bool,
    /// Polls made while the proxy pool is exhausted
    pub proxy_wait_attempts: u32,
    /// Interval between proxy polls
    pub proxy_wait_interval: Duration,
    /// Progress reporting interval
    pub monitor_interval: Duration,
    /// Bounded wait for each worker on shutdown
    pub join_timeout: Duration,
    /// Proxy cooldown settings
    pub proxies: ProxyConfig,
}

impl RunSettings {
    /// Derive settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let workers = &config.workers;
        Self {
            threads: workers.threads,
            delay: Duration::from_secs(config.probing.delay_secs),
            pause_on_found: workers.pause_on_found,
            auto_continue: workers.auto_continue,
            proxy_wait_attempts: workers.proxy_wait_attempts,
            proxy_wait_interval: Duration::from_millis(workers.proxy_wait_interval_ms),
            monitor_interval: Duration::from_millis(workers.monitor_interval_ms),
            join_timeout: Duration::from_secs(workers.join_timeout_secs),
            proxies: config.proxies.clone(),
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Found accounts in discovery order
    pub found: Vec<FoundAccount>,
    /// Items marked completed
    pub completed: usize,
    /// Final progress snapshot
    pub progress: RunProgress,
    /// Tally of every check result
    pub summary: RunSummary,
    /// Whether the run ended on a stop request
    pub stopped: bool,
}

enum ProxyLease {
    Direct,
    Proxy(String),
    Exhausted,
}

impl ProxyLease {
    fn address(&self) -> Option<&str> {
        match self {
            Self::Proxy(address) => Some(address),
            Self::Direct | Self::Exhausted => None,
        }
    }
}

/// State shared by every worker of one run.
struct RunState {
    checker: Arc<dyn CandidateChecker>,
    resolver: Arc<dyn PauseResolver>,
    control: Arc<RunControl>,
    settings: RunSettings,
    pool: ProxyPool,
    distributor: WorkDistributor,
    found: FoundList,
    summary: Mutex<RunSummary>,
    prompt: Mutex<()>,
}

impl RunState {
    fn progress(&self) -> RunProgress {
        RunProgress {
            proxy_status: self.pool.get_status(),
            work_progress: self.distributor.get_progress(),
        }
    }

    fn worker_loop(&self, worker_id: Option<usize>) {
        debug!(?worker_id, "worker started");

        while !self.control.is_stopped() {
            if self.control.should_hold() {
                self.control.wait(PAUSE_POLL);
                continue;
            }

            let Some(item) = self.distributor.get_work() else {
                break;
            };

            let lease = self.acquire_proxy();
            if matches!(lease, ProxyLease::Exhausted) {
                warn!(
                    ?worker_id,
                    index = item.index,
                    "no proxy became available; dropping item"
                );
                self.distributor.mark_failed(item.index);
                continue;
            }

            let processed = panic::catch_unwind(AssertUnwindSafe(|| {
                self.process(&item, lease.address(), worker_id);
            }));

            if let Err(payload) = processed {
                error!(
                    ?worker_id,
                    index = item.index,
                    panic = %panic_message(payload.as_ref()),
                    "worker panicked; it will not take more work"
                );
                self.distributor.mark_failed(item.index);
                if let Some(address) = lease.address() {
                    self.pool.report_error(address);
                }
                return;
            }

            self.distributor.mark_completed(item.index);

            if self.distributor.get_progress().remaining == 0 {
                break;
            }
            if !self.control.sleep(self.settings.delay) {
                break;
            }
        }

        debug!(?worker_id, "worker finished");
    }

    fn acquire_proxy(&self) -> ProxyLease {
        if self.pool.is_empty() {
            return ProxyLease::Direct;
        }
        if let Some(address) = self.pool.get_available_proxy() {
            return ProxyLease::Proxy(address);
        }

        debug!(
            attempts = self.settings.proxy_wait_attempts,
            "proxy pool exhausted; waiting"
        );
        for _ in 0..self.settings.proxy_wait_attempts {
            if !self.control.sleep(self.settings.proxy_wait_interval) {
                break;
            }
            if let Some(address) = self.pool.get_available_proxy() {
                return ProxyLease::Proxy(address);
            }
        }
        ProxyLease::Exhausted
    }

    fn process(&self, item: &WorkItem, proxy: Option<&str>, worker_id: Option<usize>) {
        let pinned = proxy.map(PinnedProxy::new);
        let results = self.checker.check(
            &item.candidate,
            pinned.as_ref().map(|p| p as &dyn ProxySource),
        );

        for result in &results {
            self.summary.lock().update_with(result);

            match result.status {
                CheckStatus::Found => self.record_found(result, item.index, worker_id),
                CheckStatus::RateLimited => {
                    if let Some(address) = proxy {
                        self.pool.report_rate_limit(address);
                    }
                }
                CheckStatus::Error => {
                    if let Some(address) = proxy.filter(|_| is_block(result)) {
                        self.pool.report_error(address);
                    }
                }
                CheckStatus::NotFound | CheckStatus::Invalid | CheckStatus::Unknown => {}
            }
        }
    }

    fn record_found(&self, result: &CheckResult, index: usize, worker_id: Option<usize>) {
        let account = FoundAccount::from_result(result, index, worker_id);
        info!(
            number = %account.number,
            platform = %account.platform,
            index,
            ?worker_id,
            "account found"
        );
        self.found.push(account.clone());

        if !self.settings.pause_on_found {
            return;
        }

        // One prompt at a time; decisions made while waiting apply to us too.
        let _prompt = self.prompt.lock();
        if self.control.is_auto_continue() || self.control.is_stopped() {
            return;
        }

        self.control.pause();
        let _unpause = ResumeOnUnwind(&self.control);
        let decision = self.resolver.resolve(&account, &self.control);
        info!(?decision, "pause resolved");
        match decision {
            PauseDecision::Continue => self.control.resume(),
            PauseDecision::Stop => self.control.stop(),
            PauseDecision::AutoContinue => self.control.enable_auto_continue(),
        }
    }
}

/// Clears the pause signal when the resolver unwinds.
struct ResumeOnUnwind<'a>(&'a RunControl);

impl Drop for ResumeOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("pause resolver panicked; resuming the run");
            self.0.resume();
        }
    }
}

fn is_block(result: &CheckResult) -> bool {
    let text = format!("{} {}", result.error.as_deref().unwrap_or_default(), result.raw());
    text.to_lowercase().contains("blocked")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a candidate sequence across a pool of workers.
pub struct Coordinator {
    checker: Arc<dyn CandidateChecker>,
    settings: RunSettings,
    resolver: Arc<dyn PauseResolver>,
    sink: Option<Arc<dyn ProgressSink>>,
    control: Arc<RunControl>,
}

impl Coordinator {
    /// Create a coordinator. Found results resume the run unless a resolver
    /// is supplied.
    #[must_use]
    pub fn new(checker: Arc<dyn CandidateChecker>, settings: RunSettings) -> Self {
        Self {
            checker,
            settings,
            resolver: Arc::new(PauseDecision::Continue),
            sink: None,
            control: Arc::new(RunControl::new()),
        }
    }

    /// Set the callback consulted when a found result pauses the run.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PauseResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set the receiver of periodic progress snapshots.
    #[must_use]
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Handle for stopping or pausing the run from outside.
    ///
    /// A stopped coordinator stays stopped; build a new one for the next run.
    #[must_use]
    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    /// Settings in effect.
    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Process `items`, routing traffic through `proxy_addresses` when given.
    ///
    /// Blocks until every worker has exited or the join timeout elapsed.
    ///
    /// # Errors
    /// Returns error if no worker thread could be started.
    pub fn run(
        &self,
        items: impl IntoIterator<Item = WorkItem>,
        proxy_addresses: impl IntoIterator<Item = String>,
    ) -> Result<RunReport> {
        if self.settings.auto_continue {
            self.control.enable_auto_continue();
        }

        let state = Arc::new(RunState {
            checker: Arc::clone(&self.checker),
            resolver: Arc::clone(&self.resolver),
            control: Arc::clone(&self.control),
            settings: self.settings.clone(),
            pool: ProxyPool::with_config(proxy_addresses, &self.settings.proxies),
            distributor: WorkDistributor::new(items),
            found: FoundList::default(),
            summary: Mutex::new(RunSummary::new()),
            prompt: Mutex::new(()),
        });

        let initial = state.progress();
        info!(
            threads = self.settings.threads,
            items = initial.work_progress.remaining,
            proxies = initial.proxy_status.total,
            "starting run"
        );

        let stopped = if self.settings.threads == 0 {
            state.worker_loop(None);
            self.control.is_stopped()
        } else {
            self.run_threaded(&state)?
        };

        let progress = state.progress();
        self.emit_progress(&progress);

        let summary = state.summary.lock().clone();
        let report = RunReport {
            found: state.found.snapshot(),
            completed: progress.work_progress.completed,
            progress,
            summary,
            stopped,
        };

        info!(
            run_id = %report.summary.run_id,
            completed = report.completed,
            found = report.found.len(),
            stopped = report.stopped,
            "run finished"
        );
        Ok(report)
    }

    fn run_threaded(&self, state: &Arc<RunState>) -> Result<bool> {
        let mut handles = Vec::with_capacity(self.settings.threads);
        for worker_id in 0..self.settings.threads {
            let worker_state = Arc::clone(state);
            let spawned = thread::Builder::new()
                .name(format!("tessera-worker-{worker_id}"))
                .spawn(move || worker_state.worker_loop(Some(worker_id)));

            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(source) => {
                    let err = SchedulerError::Spawn { worker_id, source };
                    warn!(error = %err, "continuing with fewer workers");
                }
            }
        }

        if handles.is_empty() {
            return Err(SchedulerError::NoWorkers);
        }

        while !self.control.is_stopped() && handles.iter().any(|(_, h)| !h.is_finished()) {
            self.emit_progress(&state.progress());
            self.control.wait(self.settings.monitor_interval);
        }

        let stopped = self.control.is_stopped();
        self.control.stop();
        self.join_all(handles);
        Ok(stopped)
    }

    fn join_all(&self, handles: Vec<(usize, JoinHandle<()>)>) {
        for (worker_id, handle) in handles {
            let deadline = Instant::now() + self.settings.join_timeout;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL);
            }

            if !handle.is_finished() {
                warn!(worker_id, "worker did not stop in time; detaching");
                continue;
            }
            if handle.join().is_err() {
                warn!(worker_id, "worker exited with a panic");
            }
        }
    }

    fn emit_progress(&self, progress: &RunProgress) {
        let Some(sink) = &self.sink else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| sink.on_progress(progress))).is_err() {
            debug!("progress sink panicked; ignoring");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("settings", &self.settings)
            .field("has_progress_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(raw: &str, error: Option<&str>) -> CheckResult {
        let mut result = CheckResult::from_legacy("Dummy", "1", raw);
        result.error = error.map(str::to_string);
        result
    }

    #[test]
    fn test_is_block() {
        assert!(is_block(&result("[ERROR]: request blocked", None)));
        assert!(is_block(&result("[ERROR]: x", Some("IP Blocked by WAF"))));
        assert!(!is_block(&result("[ERROR]: Request timeout", None)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AppConfig::default();
        config.workers.threads = 4;
        config.probing.delay_secs = 3;

        let settings = RunSettings::from_config(&config);
        assert_eq!(settings.threads, 4);
        assert_eq!(settings.delay, Duration::from_secs(3));
        assert_eq!(settings.proxy_wait_attempts, 30);
        assert_eq!(settings.proxy_wait_interval, Duration::from_secs(1));
        assert_eq!(settings.join_timeout, Duration::from_secs(5));
        assert!(settings.pause_on_found);
    }
}
