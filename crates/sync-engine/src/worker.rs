// crates/sync-engine/src/worker.rs
//! Background sync loop
//!
//! One task per session. Foreground code reaches it only through the event
//! channel and the stop signal; the pool of unsent events is owned by the
//! task.

use crate::engine::{SyncConfig, SyncEngine};
use crate::error::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use vaultsync_core::{Event, StatusCode};

/// Why the worker stopped
#[derive(Debug)]
pub enum WorkerExit {
    /// Stop signal received
    Stopped,
    /// Unrecoverable sync error; the session has been ended
    Failed(SyncError),
}

/// Final state of a finished worker
#[derive(Debug)]
pub struct WorkerReport {
    pub exit: WorkerExit,
    /// Events never confirmed by the server, in publish order
    pub unsent: Vec<Event>,
}

/// Handle owned by the session to talk to its worker
pub struct WorkerHandle {
    events: mpsc::Sender<Event>,
    stop: watch::Sender<bool>,
    task: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Returns a sender for queueing events
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.events.clone()
    }

    /// Returns true while the sync loop is running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the worker to stop and waits for its report
    pub async fn shutdown(self) -> WorkerReport {
        let Self { events, stop, task } = self;
        // Ignored: the worker may already be gone
        let _ = stop.send(true);
        drop(events);
        join_task(task).await
    }

    /// Waits for the worker to finish on its own
    pub async fn join(self) -> WorkerReport {
        join_task(self.task).await
    }
}

async fn join_task(task: JoinHandle<WorkerReport>) -> WorkerReport {
    match task.await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Sync worker panicked: {}", e);
            WorkerReport {
                exit: WorkerExit::Failed(SyncError::ReloginNeeded(
                    "sync worker panicked".to_string(),
                )),
                unsent: Vec::new(),
            }
        }
    }
}

/// The sync loop state
pub struct SyncWorker {
    engine: Arc<SyncEngine>,
    events: mpsc::Receiver<Event>,
    stop: watch::Receiver<bool>,
    pool: Vec<Event>,
    pull_interval: Duration,
    push_interval: Duration,
}

impl SyncWorker {
    /// Spawns the loop on the current runtime
    ///
    /// `pool` seeds the unsent events, e.g. those carried over from a
    /// previous session.
    pub fn spawn(engine: Arc<SyncEngine>, config: &SyncConfig, pool: Vec<Event>) -> WorkerHandle {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let worker = Self {
            engine,
            events: events_rx,
            stop: stop_rx,
            pool,
            pull_interval: config.pull_interval,
            push_interval: config.push_interval,
        };

        WorkerHandle {
            events: events_tx,
            stop: stop_tx,
            task: tokio::spawn(worker.run()),
        }
    }

    async fn run(mut self) -> WorkerReport {
        log::info!(
            "Sync worker started (pull every {:?}, push every {:?})",
            self.pull_interval,
            self.push_interval
        );

        let mut pull = ticker(self.pull_interval);
        let mut push = ticker(self.push_interval);

        let exit = loop {
            tokio::select! {
                biased;

                _ = self.stop.changed() => break WorkerExit::Stopped,

                _ = pull.tick() => {
                    if let Err(e) = self.pull().await {
                        break WorkerExit::Failed(e);
                    }
                }

                Some(event) = self.events.recv() => {
                    log::debug!("Queued {} of {}", event.operation, event.item_id());
                    self.pool.push(event);
                }

                _ = push.tick() => {
                    if let Err(e) = self.push().await {
                        break WorkerExit::Failed(e);
                    }
                }
            }
        };

        self.finish(exit).await
    }

    async fn pull(&mut self) -> Result<(), SyncError> {
        let requeued = self.engine.whats_new().await?;
        requeue(&mut self.pool, requeued);
        self.settle_pool()
    }

    /// Drops queued events whose entry a merge has already settled
    ///
    /// A non-pending entry either holds the server's confirmation of the
    /// queued content or the server content the resolver chose.
    fn settle_pool(&mut self) -> Result<(), SyncError> {
        let pending = self.engine.repository().pending_ids()?;
        let before = self.pool.len();
        self.pool.retain(|event| pending.contains(&event.item_id()));

        let settled = before - self.pool.len();
        if settled > 0 {
            log::info!("Dropped {} event(s) already settled by the server", settled);
        }
        Ok(())
    }

    async fn push(&mut self) -> Result<(), SyncError> {
        self.settle_pool()?;
        match self.engine.send_events(&self.pool).await {
            Ok(()) => {
                self.pool.clear();
                Ok(())
            }
            Err(SyncError::StaleData) => {
                log::info!("Push rejected as stale, pulling first");
                self.pull().await
            }
            Err(e) => {
                if e.status_code() == Some(StatusCode::InvalidArgument) {
                    log::error!("Server refused a batch of {} event(s)", self.pool.len());
                }
                Err(e)
            }
        }
    }

    async fn finish(mut self, exit: WorkerExit) -> WorkerReport {
        self.events.close();
        while let Ok(event) = self.events.try_recv() {
            self.pool.push(event);
        }

        match &exit {
            WorkerExit::Stopped => log::info!("Sync worker stopped"),
            WorkerExit::Failed(e) => {
                log::error!("Sync worker failed: {}", e);
                self.engine.end_session().await;
            }
        }

        if !self.pool.is_empty() {
            log::info!("{} unsent event(s) left", self.pool.len());
        }

        WorkerReport {
            exit,
            unsent: self.pool,
        }
    }
}

/// Adds events produced by keep-local resolutions to the pool
///
/// A requeued event carries the full local content rebased on the server
/// version, so it replaces every queued event for the same item.
pub(crate) fn requeue(pool: &mut Vec<Event>, requeued: Vec<Event>) {
    for event in requeued {
        let id = event.item_id();
        pool.retain(|queued| queued.item_id() != id);
        pool.push(event);
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
