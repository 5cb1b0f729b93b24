//! Terminal hooks for the coordinator: the pause prompt, progress lines and
//! the interrupt handler.

use parking_lot::Mutex;
use std::future::Future;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tessera_core::RunProgress;
use tessera_scheduler::{FoundAccount, PauseDecision, PauseResolver, ProgressSink, RunControl};
use tracing::{info, warn};

const STOP_POLL: Duration = Duration::from_millis(200);
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Map an operator answer onto a decision. Anything unrecognized continues.
#[must_use]
pub fn parse_choice(input: &str) -> PauseDecision {
    match input.trim().to_lowercase().as_str() {
        "s" | "stop" => PauseDecision::Stop,
        "a" | "auto" => PauseDecision::AutoContinue,
        _ => PauseDecision::Continue,
    }
}

/// Asks on stdin how to proceed after a found account.
///
/// Lines are read on a background thread so a pending prompt still notices
/// a stop request. End of input counts as stop.
pub struct StdinResolver {
    lines: Mutex<Receiver<String>>,
}

impl StdinResolver {
    /// Start reading stdin.
    ///
    /// # Errors
    /// Returns error if the reader thread cannot be spawned.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("tessera-stdin".to_string())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_receiver(rx))
    }

    /// Resolve from an existing line source.
    #[must_use]
    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self {
            lines: Mutex::new(lines),
        }
    }
}

impl PauseResolver for StdinResolver {
    fn resolve(&self, account: &FoundAccount, control: &RunControl) -> PauseDecision {
        let lines = self.lines.lock();

        // Drop anything typed before the prompt appeared.
        while lines.try_recv().is_ok() {}

        println!(
            "\nAccount found: {} on {}. [Enter] continue, [s] stop, [a] auto-continue",
            account.number, account.platform
        );
        let _ = io::stdout().flush();

        loop {
            if control.is_stopped() {
                return PauseDecision::Stop;
            }
            match lines.recv_timeout(STOP_POLL) {
                Ok(line) => return parse_choice(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("stdin closed while paused; stopping");
                    return PauseDecision::Stop;
                }
            }
        }
    }
}

/// Logs progress snapshots through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress {
    last: Mutex<Option<RunProgress>>,
}

impl ProgressSink for LogProgress {
    fn on_progress(&self, progress: &RunProgress) {
        let mut last = self.last.lock();
        if last.as_ref() == Some(progress) {
            return;
        }
        *last = Some(*progress);

        let work = progress.work_progress;
        let proxies = progress.proxy_status;
        info!(
            completed = work.completed,
            in_progress = work.in_progress,
            remaining = work.remaining,
            proxies_available = proxies.available,
            proxies_cooling = proxies.cooling_down,
            "progress"
        );
    }
}

/// Stop the run on Ctrl-C so the results found so far are still reported.
///
/// A second interrupt while stopping exits the process.
///
/// # Errors
/// Returns error if the signal runtime or its thread cannot be started.
pub fn spawn_interrupt_handler(control: Arc<RunControl>) -> io::Result<JoinHandle<()>> {
    spawn_stop_on(control, tokio::signal::ctrl_c)
}

fn spawn_stop_on<F, Fut>(
    control: Arc<RunControl>,
    mut interrupted: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("tessera-signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                while interrupted().await.is_ok() {
                    if control.is_stopped() {
                        warn!("interrupted again; exiting");
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                    warn!("interrupted; stopping workers");
                    control.stop();
                }
            });
        })
}
