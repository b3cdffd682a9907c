//! Auto-save scheduling
//!
//! Two ways to drive [`Session::auto_save`]:
//! - [`AutoSaveTimer`]: a plain deadline the host polls from its own loop
//! - [`AutoSaveTask`]: a tokio interval task over a shared session
//!
//! Stopping either one never touches the vault file.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::{AutoSaveOutcome, Session};

/// Session handle shared between the host and an [`AutoSaveTask`]
pub type SharedSession = Arc<Mutex<Session>>;

/// Poll-driven auto-save deadline
#[derive(Debug, Clone)]
pub struct AutoSaveTimer {
    interval: Duration,
    next_due: Option<Instant>,
}

impl AutoSaveTimer {
    /// Stopped timer; call [`start`](Self::start) to arm it
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Time left until the next trigger, for countdown displays
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    /// True once per elapsed interval. Re-arms relative to `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// Polls and, when due, runs one auto-save on `session`
    pub fn tick(&mut self, session: &mut Session, now: Instant) -> Option<AutoSaveOutcome> {
        if self.poll(now) {
            Some(session.auto_save())
        } else {
            None
        }
    }
}

/// Background auto-save over a [`SharedSession`].
///
/// The first trigger fires one full `period` after spawning. Each save runs
/// on the blocking pool so file I/O never stalls a runtime worker. If the
/// session is locked by someone else (e.g. a user-initiated save) when a tick
/// fires, that tick is skipped and the next one retries.
pub struct AutoSaveTask {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSaveTask {
    /// Must be called from within a tokio runtime
    pub fn spawn(session: SharedSession, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let shared = Arc::clone(&session);
                        let outcome = tokio::task::spawn_blocking(move || {
                            shared.try_lock().map(|mut s| s.auto_save())
                        })
                        .await;
                        match outcome {
                            Ok(Some(_)) => {}
                            Ok(None) => tracing::debug!("session busy, auto-save deferred to next tick"),
                            Err(e) => tracing::warn!(error = %e, "auto-save worker failed"),
                        }
                    }
                }
            }
            tracing::debug!("auto-save task stopped");
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stops the task and waits for it to finish
    pub async fn cancel(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AutoSaveTask {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
