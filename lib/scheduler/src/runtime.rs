//! The scheduler and health monitor as independent periodic tasks.
//!
//! Two loops run concurrently on their own cadences: the scheduler tick
//! (default 60s) and the health probe pass (default 5 minutes). Both watch
//! one shutdown channel so the service can stop them together.

use chrono::Utc;
use cobalt_courier_sync::health::HealthMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::scheduler::SyncScheduler;

/// Handle over the spawned loops.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) leaves
/// the loops running for the lifetime of the runtime.
pub struct ShutdownHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ShutdownHandle {
    /// Signals both loops to stop and waits for them to finish.
    ///
    /// In-flight sync attempts are not awaited; jobs interrupted by
    /// process exit are reconciled at the next bootstrap.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Spawns the scheduler and health monitor loops.
#[must_use]
pub fn spawn_loops(
    scheduler: Arc<SyncScheduler>,
    monitor: Arc<HealthMonitor>,
    tick_interval: Duration,
    probe_interval: Duration,
) -> ShutdownHandle {
    let (tx, rx) = watch::channel(false);
    let tasks = vec![
        spawn_scheduler_loop(scheduler, tick_interval, rx.clone()),
        spawn_health_loop(monitor, probe_interval, rx),
    ];
    ShutdownHandle { shutdown: tx, tasks }
}

fn spawn_scheduler_loop(
    scheduler: Arc<SyncScheduler>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Detached so a long pass never delays shutdown; the
                    // running-job check keeps overlapping passes harmless.
                    let scheduler = Arc::clone(&scheduler);
                    tokio::spawn(async move {
                        let dispatched = scheduler.tick(Utc::now()).await;
                        if dispatched > 0 {
                            tracing::debug!(dispatched, "Scheduler tick dispatched syncs");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Scheduler loop stopped");
    })
}

fn spawn_health_loop(
    monitor: Arc<HealthMonitor>,
    probe_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(probe_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    monitor.probe_all().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Health monitor loop stopped");
    })
}
