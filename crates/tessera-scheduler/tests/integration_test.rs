//! Integration tests for work distribution and run coordination
//!
//! Exercises the distributor under racing consumers and drives full runs
//! through a scripted checker to verify outcome routing, pausing and worker
//! containment.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;
use tessera_core::{CheckResult, CheckStatus, ProxyConfig, RunProgress, WorkItem};
use tessera_proxy::ProxySource;
use tessera_scheduler::{
    CandidateChecker, Coordinator, FoundAccount, PauseDecision, PauseResolver, ProgressSink,
    RunControl, RunSettings, WorkDistributor,
};

const NOT_FOUND: &str = "[NOT FOUND]: No signals matched";
const FOUND: &str = "[FOUND]: Confirmed by descriptor signals";

/// Returns a canned outcome per candidate and records every call.
#[derive(Default)]
struct ScriptedChecker {
    outcomes: HashMap<String, &'static str>,
    panic_on: Option<String>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedChecker {
    fn with(mut self, candidate: &str, raw: &'static str) -> Self {
        self.outcomes.insert(candidate.to_string(), raw);
        self
    }

    fn panicking_on(mut self, candidate: &str) -> Self {
        self.panic_on = Some(candidate.to_string());
        self
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }
}

impl CandidateChecker for ScriptedChecker {
    fn check(&self, candidate: &str, proxies: Option<&dyn ProxySource>) -> Vec<CheckResult> {
        let proxy = proxies.and_then(|p| p.acquire());
        self.calls.lock().push((candidate.to_string(), proxy));

        assert!(
            self.panic_on.as_deref() != Some(candidate),
            "scripted checker failure"
        );

        let raw = self.outcomes.get(candidate).copied().unwrap_or(NOT_FOUND);
        vec![CheckResult::from_legacy("Scripted", candidate, raw)]
    }
}

fn candidate(i: usize) -> String {
    format!("+4207312345{i:02}")
}

fn items(n: usize) -> Vec<WorkItem> {
    (1..=n).map(|i| WorkItem::new(i, candidate(i))).collect()
}

fn fast_settings(threads: usize) -> RunSettings {
    RunSettings {
        threads,
        delay: Duration::ZERO,
        pause_on_found: false,
        auto_continue: false,
        proxy_wait_attempts: 3,
        proxy_wait_interval: Duration::from_millis(5),
        monitor_interval: Duration::from_millis(5),
        join_timeout: Duration::from_secs(2),
        proxies: ProxyConfig::default(),
    }
}

#[test]
fn test_two_consumers_get_distinct_items() {
    let distributor = WorkDistributor::new(items(2));
    let barrier = Barrier::new(2);

    let claimed: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    distributor.get_work().expect("one item per consumer").index
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("consumer thread"))
            .collect()
    });

    let unique: HashSet<usize> = claimed.iter().copied().collect();
    assert_eq!(unique, HashSet::from([1, 2]));

    for index in claimed {
        distributor.mark_completed(index);
    }
    assert!(distributor.is_complete());
    assert!(distributor.get_work().is_none());
}

#[test]
fn test_racing_consumers_never_share_an_index() {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let distinct = rng.gen_range(1..200);
        let mut work: Vec<WorkItem> = (0..distinct)
            .map(|i| WorkItem::new(i, candidate(i % 100)))
            .collect();
        let dups = rng.gen_range(0..distinct);
        for _ in 0..dups {
            let i = rng.gen_range(0..distinct);
            work.push(WorkItem::new(i, "duplicate"));
        }
        work.shuffle(&mut rng);

        let consumers = rng.gen_range(2..8);
        let distributor = WorkDistributor::new(work);
        let seen = Mutex::new(Vec::new());

        thread::scope(|s| {
            for _ in 0..consumers {
                s.spawn(|| {
                    while let Some(item) = distributor.get_work() {
                        seen.lock().push(item.index);
                        distributor.mark_completed(item.index);
                    }
                });
            }
        });

        let seen = seen.into_inner();
        let unique: HashSet<usize> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len(), "an index was handed out twice");
        assert_eq!(unique.len(), distinct);
        assert_eq!(distributor.get_progress().completed, distinct);
        assert!(distributor.is_complete());
    }
}

#[test]
fn test_found_with_stop_decision_ends_run() {
    let checker = Arc::new(ScriptedChecker::default().with(&candidate(2), FOUND));
    let resolved = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resolved);
    let resolver: Arc<dyn PauseResolver> =
        Arc::new(move |account: &FoundAccount, control: &RunControl| {
            assert!(control.is_paused());
            assert_eq!(account.index, 2);
            counter.fetch_add(1, Ordering::SeqCst);
            PauseDecision::Stop
        });

    let settings = RunSettings {
        pause_on_found: true,
        ..fast_settings(1)
    };
    let report = Coordinator::new(checker.clone(), settings)
        .with_resolver(resolver)
        .run(items(5), Vec::new())
        .expect("run");

    assert!(report.stopped);
    assert_eq!(resolved.load(Ordering::SeqCst), 1);
    assert_eq!(report.found.len(), 1);
    assert_eq!(report.found[0].number, candidate(2));
    assert_eq!(report.found[0].platform, "Scripted");
    assert_eq!(report.found[0].worker_id, Some(0));
    // the found item still completes before the worker observes the stop
    assert_eq!(report.completed, 2);
    assert_eq!(checker.calls().len(), 2);
}

#[test]
fn test_auto_continue_suppresses_later_pauses() {
    let checker = Arc::new(
        ScriptedChecker::default()
            .with(&candidate(2), FOUND)
            .with(&candidate(4), FOUND),
    );
    let resolved = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&resolved);
    let resolver: Arc<dyn PauseResolver> =
        Arc::new(move |_: &FoundAccount, _: &RunControl| {
            counter.fetch_add(1, Ordering::SeqCst);
            PauseDecision::AutoContinue
        });

    let settings = RunSettings {
        pause_on_found: true,
        ..fast_settings(1)
    };
    let report = Coordinator::new(checker, settings)
        .with_resolver(resolver)
        .run(items(5), Vec::new())
        .expect("run");

    assert!(!report.stopped);
    assert_eq!(resolved.load(Ordering::SeqCst), 1);
    assert_eq!(report.found.len(), 2);
    assert_eq!(report.completed, 5);
    assert_eq!(report.summary.found, 2);
    assert_eq!(report.summary.total_checked, 5);
}

#[test]
fn test_rate_limit_cools_proxy_and_exhaustion_fails_item() {
    let checker = Arc::new(
        ScriptedChecker::default().with(&candidate(1), "[RATE LIMITED]: Too many requests"),
    );

    let report = Coordinator::new(checker.clone(), fast_settings(1))
        .run(items(2), vec!["http://10.0.0.1:8080".to_string()])
        .expect("run");

    // item 2 never found a proxy and was dropped without a check
    let calls = checker.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.as_deref(), Some("http://10.0.0.1:8080"));

    assert_eq!(report.completed, 1);
    assert_eq!(report.progress.work_progress.in_progress, 0);
    assert_eq!(report.progress.work_progress.remaining, 0);
    assert_eq!(report.progress.proxy_status.cooling_down, 1);
    assert_eq!(report.summary.rate_limited, 1);
}

#[test]
fn test_only_block_errors_are_reported() {
    let checker = Arc::new(
        ScriptedChecker::default()
            .with(&candidate(1), "[ERROR]: Request timeout")
            .with(&candidate(2), "[ERROR]: Request blocked by upstream"),
    );
    let settings = RunSettings {
        proxies: ProxyConfig {
            error_threshold: 1,
            ..ProxyConfig::default()
        },
        ..fast_settings(1)
    };

    let report = Coordinator::new(checker.clone(), settings)
        .run(items(2), vec!["http://10.0.0.1:8080".to_string()])
        .expect("run");

    // the timeout left the proxy usable for the second item
    assert_eq!(checker.calls().len(), 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.summary.errors, 2);
    assert_eq!(report.progress.proxy_status.cooling_down, 1);
}

#[test]
fn test_direct_when_no_proxies_configured() {
    let checker = Arc::new(ScriptedChecker::default());

    let report = Coordinator::new(checker.clone(), fast_settings(2))
        .run(items(4), Vec::new())
        .expect("run");

    assert_eq!(report.completed, 4);
    assert!(checker.calls().iter().all(|(_, proxy)| proxy.is_none()));
}

#[test]
fn test_panicking_worker_only_stops_itself() {
    let checker = Arc::new(ScriptedChecker::default().panicking_on(&candidate(1)));

    let report = Coordinator::new(checker.clone(), fast_settings(2))
        .run(items(6), Vec::new())
        .expect("run");

    assert!(!report.stopped);
    assert_eq!(report.completed, 5);
    assert_eq!(report.progress.work_progress.in_progress, 0);
    assert_eq!(report.progress.work_progress.remaining, 0);
    assert_eq!(checker.calls().len(), 6);
}

#[test]
fn test_sequential_mode() {
    let checker = Arc::new(ScriptedChecker::default().with(&candidate(3), FOUND));
    let resolver: Arc<dyn PauseResolver> = Arc::new(PauseDecision::Continue);
    let settings = RunSettings {
        pause_on_found: true,
        ..fast_settings(0)
    };

    let report = Coordinator::new(checker.clone(), settings)
        .with_resolver(resolver)
        .run(items(4), Vec::new())
        .expect("run");

    assert!(!report.stopped);
    assert_eq!(report.completed, 4);
    assert_eq!(report.found.len(), 1);
    assert_eq!(report.found[0].worker_id, None);
    assert_eq!(report.found[0].status, CheckStatus::Found);

    let order: Vec<String> = checker.calls().into_iter().map(|(c, _)| c).collect();
    assert_eq!(order, (1..=4).map(candidate).collect::<Vec<_>>());
}

#[test]
fn test_progress_sink_receives_snapshots() {
    let checker = Arc::new(ScriptedChecker::default());
    let last = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&last);
    let sink: Arc<dyn ProgressSink> = Arc::new(move |progress: &RunProgress| {
        *captured.lock() = Some(*progress);
    });

    let report = Coordinator::new(checker, fast_settings(2))
        .with_progress_sink(sink)
        .run(items(3), Vec::new())
        .expect("run");

    let snapshot = (*last.lock()).expect("at least one snapshot");
    assert_eq!(snapshot, report.progress);
    assert_eq!(snapshot.work_progress.completed, 3);
}

#[test]
fn test_panicking_progress_sink_is_ignored() {
    let checker = Arc::new(ScriptedChecker::default());
    let sink: Arc<dyn ProgressSink> = Arc::new(|_: &RunProgress| panic!("display failed"));

    let report = Coordinator::new(checker, fast_settings(1))
        .with_progress_sink(sink)
        .run(items(2), Vec::new())
        .expect("run");

    assert_eq!(report.completed, 2);
}

#[test]
fn test_stop_before_run_processes_nothing() {
    let checker = Arc::new(ScriptedChecker::default());
    let coordinator = Coordinator::new(checker.clone(), fast_settings(2));
    coordinator.control().stop();

    let report = coordinator.run(items(3), Vec::new()).expect("run");

    assert!(report.stopped);
    assert_eq!(report.completed, 0);
    assert!(checker.calls().is_empty());
}

#[test]
fn test_panicking_resolver_releases_other_workers() {
    let checker = Arc::new(ScriptedChecker::default().with(&candidate(2), FOUND));
    let resolver: Arc<dyn PauseResolver> =
        Arc::new(|_: &FoundAccount, _: &RunControl| -> PauseDecision {
            panic!("prompt failed")
        });
    let settings = RunSettings {
        pause_on_found: true,
        ..fast_settings(2)
    };

    let coordinator = Coordinator::new(checker.clone(), settings).with_resolver(resolver);
    let control = coordinator.control();
    let (done_tx, done_rx) = mpsc::channel();
    let runner = thread::spawn(move || {
        let report = coordinator.run(items(6), Vec::new());
        let _ = done_tx.send(());
        report
    });

    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("run finishes after the resolver panics");
    let report = runner.join().expect("runner thread").expect("run");

    assert!(!control.is_paused());
    assert!(!report.stopped);
    assert_eq!(report.found.len(), 1);
    // the item whose prompt panicked is dropped, the rest complete
    assert_eq!(report.completed, 5);
    assert_eq!(checker.calls().len(), 6);
}

#[test]
fn test_pause_holds_other_workers_until_resolved() {
    let checker = Arc::new(ScriptedChecker::default().with(&candidate(1), FOUND));
    let (entered_tx, entered_rx) = mpsc::channel();
    let (answer_tx, answer_rx) = mpsc::channel();
    let entered_tx = Mutex::new(entered_tx);
    let answer_rx = Mutex::new(answer_rx);
    let resolver: Arc<dyn PauseResolver> =
        Arc::new(move |_: &FoundAccount, control: &RunControl| {
            assert!(control.is_paused());
            let _ = entered_tx.lock().send(());
            answer_rx
                .lock()
                .recv_timeout(Duration::from_secs(5))
                .unwrap_or(PauseDecision::Stop)
        });
    let settings = RunSettings {
        pause_on_found: true,
        delay: Duration::from_millis(20),
        ..fast_settings(2)
    };

    let coordinator = Coordinator::new(checker.clone(), settings).with_resolver(resolver);
    let runner = thread::spawn(move || coordinator.run(items(10), Vec::new()));

    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("resolver consulted");
    // let any check already in flight finish
    thread::sleep(Duration::from_millis(100));
    let held = checker.calls().len();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(checker.calls().len(), held, "work taken while paused");
    assert!(held < 10);

    answer_tx.send(PauseDecision::Continue).expect("send decision");
    let report = runner.join().expect("runner thread").expect("run");

    assert!(!report.stopped);
    assert_eq!(report.completed, 10);
    assert_eq!(checker.calls().len(), 10);
}
