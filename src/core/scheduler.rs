//! Periodic and on-demand workspace refreshes with at most one scan running.
//!
//! The supervisor loop owns the only handle to the running scan. A trigger that arrives
//! while a scan is running is dropped, not queued.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TRIGGER_QUEUE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scanning,
    /// Terminal. The timer is cancelled and no further triggers are accepted.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    FocusRegained,
    /// User action such as the initial load or a reload.
    Explicit { fetch: bool },
}

impl Trigger {
    fn wants_fetch(self, fetch_on_tick: bool) -> bool {
        match self {
            Self::Tick | Self::FocusRegained => fetch_on_tick,
            Self::Explicit { fetch } => fetch,
        }
    }
}

/// Whatever performs one refresh of the workspace.
pub trait Refresher: Send + Sync + 'static {
    fn run_refresh(self: Arc<Self>, fetch: bool) -> impl Future<Output = ()> + Send;
}

pub struct RefreshScheduler;

impl RefreshScheduler {
    /// Spawns the supervisor loop. The first timer tick fires one `period` after start.
    pub fn start<R: Refresher>(
        refresher: Arc<R>,
        period: Duration,
        fetch_on_tick: bool,
    ) -> SchedulerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let dropped = Arc::new(AtomicUsize::new(0));

        let supervisor = Supervisor {
            refresher,
            period,
            fetch_on_tick,
            state: state_tx,
            dropped: Arc::clone(&dropped),
        };
        let task = tokio::spawn(supervisor.run(trigger_rx, shutdown_rx));

        SchedulerHandle {
            triggers: trigger_tx,
            state: state_rx,
            dropped,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

struct Supervisor<R> {
    refresher: Arc<R>,
    period: Duration,
    fetch_on_tick: bool,
    state: watch::Sender<SchedulerState>,
    dropped: Arc<AtomicUsize>,
}

impl<R: Refresher> Supervisor<R> {
    async fn run(
        self,
        mut triggers: mpsc::Receiver<Trigger>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<JoinHandle<()>> = None;

        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown => break,
                _ = wait_for_scan(&mut current), if current.is_some() => {
                    current = None;
                    self.state.send_replace(SchedulerState::Idle);
                    continue;
                }
                _ = ticker.tick() => Trigger::Tick,
                received = triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            if current.is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Refresh already running, dropping {trigger:?}");
                continue;
            }

            let fetch = trigger.wants_fetch(self.fetch_on_tick);
            log::debug!("Starting refresh for {trigger:?} (fetch: {fetch})");
            self.state.send_replace(SchedulerState::Scanning);
            current = Some(tokio::spawn(Arc::clone(&self.refresher).run_refresh(fetch)));
        }

        if let Some(scan) = current.take() {
            scan.abort();
        }
        self.state.send_replace(SchedulerState::Stopped);
        log::debug!("Refresh scheduler stopped");
    }
}

async fn wait_for_scan(current: &mut Option<JoinHandle<()>>) {
    match current {
        Some(scan) => {
            if let Err(e) = scan.await {
                if e.is_panic() {
                    log::error!("Refresh task panicked: {e}");
                }
            }
        }
        None => std::future::pending().await,
    }
}

pub struct SchedulerHandle {
    triggers: mpsc::Sender<Trigger>,
    state: watch::Receiver<SchedulerState>,
    dropped: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Hands a trigger to the supervisor. Returns false if it could not be queued.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.try_send(trigger).is_ok()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Triggers discarded because a scan was already running.
    pub fn dropped_triggers(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Cancels the timer and any running scan, then waits for the loop to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
