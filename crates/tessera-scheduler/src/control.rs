//! Cooperative run control: stop, pause and auto-continue.
//!
//! Flags are atomics; a condition variable wakes sleeping workers as soon as
//! any flag changes, so stop is observed promptly at every wait point.

use crate::found::FoundAccount;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tessera_core::RunProgress;

/// Shared signals observed by workers at loop boundaries.
#[derive(Debug, Default)]
pub struct RunControl {
    stop: AtomicBool,
    pause: AtomicBool,
    auto_continue: AtomicBool,
    lock: Mutex<()>,
    changed: Condvar,
}

impl RunControl {
    /// Create a control with every flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a hard stop. In-flight requests are not interrupted.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Raise the pause signal.
    pub fn pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Clear the pause signal.
    pub fn resume(&self) {
        self.pause.store(false, Ordering::SeqCst);
        self.notify();
    }

    /// Whether the pause signal is raised.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Ignore pause requests for the rest of the run. Also clears pause.
    pub fn enable_auto_continue(&self) {
        self.auto_continue.store(true, Ordering::SeqCst);
        self.pause.store(false, Ordering::SeqCst);
        self.notify();
    }

    /// Whether auto-continue is on.
    #[must_use]
    pub fn is_auto_continue(&self) -> bool {
        self.auto_continue.load(Ordering::SeqCst)
    }

    /// Whether workers should hold off taking new work.
    #[must_use]
    pub fn should_hold(&self) -> bool {
        self.is_paused() && !self.is_auto_continue() && !self.is_stopped()
    }

    /// Sleep for `duration`, waking early on stop.
    ///
    /// Returns `false` if the run was stopped.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.lock.lock();
        while !self.is_stopped() {
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        !self.is_stopped()
    }

    /// Wait up to `timeout` for any flag to change.
    pub fn wait(&self, timeout: Duration) {
        let mut guard = self.lock.lock();
        if self.is_stopped() {
            return;
        }
        let _ = self.changed.wait_for(&mut guard, timeout);
    }

    fn notify(&self) {
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }
}

/// Operator decision after a found result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDecision {
    /// Resume the run
    Continue,
    /// Stop the run
    Stop,
    /// Resume and never pause again this run
    AutoContinue,
}

/// Decides how to proceed when a found result pauses the run.
///
/// Implementations may block, but must return once `control` is stopped.
pub trait PauseResolver: Send + Sync {
    /// Decide for one found account.
    fn resolve(&self, account: &FoundAccount, control: &RunControl) -> PauseDecision;
}

impl PauseResolver for PauseDecision {
    fn resolve(&self, _account: &FoundAccount, _control: &RunControl) -> PauseDecision {
        *self
    }
}

impl<F> PauseResolver for F
where
    F: Fn(&FoundAccount, &RunControl) -> PauseDecision + Send + Sync,
{
    fn resolve(&self, account: &FoundAccount, control: &RunControl) -> PauseDecision {
        self(account, control)
    }
}

/// Receives periodic progress snapshots.
///
/// Panics raised here are caught and ignored by the coordinator.
pub trait ProgressSink: Send + Sync {
    /// Handle one snapshot.
    fn on_progress(&self, progress: &RunProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&RunProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &RunProgress) {
        self(progress);
    }
}
