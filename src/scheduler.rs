//! Scheduling adapter: the surface a periodic trigger drives.
//!
//! The scheduler's own persistence and cron wiring live outside the engine;
//! this module provides the job wrappers it invokes plus a tokio-based
//! periodic driver with a manual trigger handle.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::orchestrator::{SyncOrchestrator, SyncReport};

/// Which entity kind(s) a trigger asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Contacts,
    Bookings,
    All,
}

/// Scheduled contact sync: log start and result, return the report.
///
/// A fetch-level failure is logged as an error; the durable audit trail is
/// the per-entity sync metadata written by the reconciler.
pub async fn run_scheduled_contact_sync(orchestrator: &SyncOrchestrator) -> SyncReport {
    info!("starting scheduled contact sync");
    let report = orchestrator.sync_contacts().await;
    log_report("contact", &report);
    report
}

/// Scheduled booking sync, same contract as the contact job.
pub async fn run_scheduled_booking_sync(orchestrator: &SyncOrchestrator) -> SyncReport {
    info!("starting scheduled booking sync");
    let report = orchestrator.sync_bookings().await;
    log_report("booking", &report);
    report
}

fn log_report(entity: &str, report: &SyncReport) {
    match report {
        SyncReport::Completed(outcome) => info!(
            entity = entity,
            synced = outcome.synced,
            errors = outcome.errors,
            "scheduled sync completed"
        ),
        SyncReport::Failed { error } => {
            error!(entity = entity, error = %error, "scheduled sync failed");
        }
    }
}

/// Periodic driver that runs a full sync on a fixed cadence and accepts
/// manual triggers in between.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
}

/// Handle to a spawned scheduler: manual triggers and shutdown.
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<SyncKind>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Errors from the scheduler handle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is no longer running")]
    Stopped,
}

impl SyncScheduler {
    #[must_use]
    pub fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
        }
    }

    /// Spawn the periodic loop onto the current runtime.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<SyncKind>(16);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let orchestrator = self.orchestrator;
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; swallow it so the first
            // scheduled pass happens one full period after spawn.
            ticker.tick().await;

            info!(period_secs = period.as_secs(), "sync scheduler started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_kind(&orchestrator, SyncKind::All).await;
                    }
                    triggered = trigger_rx.recv() => {
                        match triggered {
                            Some(kind) => run_kind(&orchestrator, kind).await,
                            None => break, // all handles dropped
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("sync scheduler stopped");
        });

        SchedulerHandle {
            trigger_tx,
            shutdown_tx,
            task,
        }
    }
}

async fn run_kind(orchestrator: &SyncOrchestrator, kind: SyncKind) {
    match kind {
        SyncKind::Contacts => {
            run_scheduled_contact_sync(orchestrator).await;
        }
        SyncKind::Bookings => {
            run_scheduled_booking_sync(orchestrator).await;
        }
        SyncKind::All => {
            run_scheduled_contact_sync(orchestrator).await;
            run_scheduled_booking_sync(orchestrator).await;
        }
    }
}

impl SchedulerHandle {
    /// Ask the running scheduler for an out-of-band sync.
    pub async fn trigger(&self, kind: SyncKind) -> Result<(), SchedulerError> {
        self.trigger_tx
            .send(kind)
            .await
            .map_err(|_| SchedulerError::Stopped)
    }

    /// Stop the loop and wait for the in-flight run, if any, to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
