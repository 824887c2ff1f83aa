//! Polling watcher over the scan folder.
//!
//! Every tick lists the immediate children of the scan folder and dispatches
//! each recognized file whose modification time differs from the one last
//! seen. The ledger is updated before the file is dispatched, so a timestamp
//! is handed to the pipeline at most once even if processing is slow or fails.
//! Deletions are not tracked and sub-folders are not descended into.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::contract::{Entry, Notifier, SourceFile, Storage, Transport};
use crate::parser::Dialect;
use crate::pipeline::{PipelineMode, ProcessingCoordinator};

pub struct Watcher<S, N, T> {
    coordinator: Arc<ProcessingCoordinator<S, N, T>>,
    /// path -> last dispatched mtime. Empty on every start.
    ledger: HashMap<String, i64>,
}

impl<S, N, T> Watcher<S, N, T>
where
    S: Storage,
    N: Notifier,
    T: Transport,
{
    pub fn new(coordinator: Arc<ProcessingCoordinator<S, N, T>>) -> Self {
        Self {
            coordinator,
            ledger: HashMap::new(),
        }
    }

    pub fn mode(&self) -> PipelineMode {
        if self.coordinator.config().watcher.use_ai {
            PipelineMode::Full
        } else {
            PipelineMode::Lite
        }
    }

    /// Files changed since the last poll, with the ledger already updated.
    pub async fn poll(&mut self) -> Vec<SourceFile> {
        let config = self.coordinator.config();
        let entries = match self.coordinator.storage().list(&config.scan_path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(scan_path = %config.scan_path, error = %e, "[WATCH] Scan folder unavailable");
                return Vec::new();
            }
        };

        let mut changed = Vec::new();
        for entry in entries {
            let Entry::File(file) = entry else { continue };
            if Dialect::classify(&file, &config.dialects) == Dialect::Generic {
                continue;
            }
            if self.ledger.get(&file.path) == Some(&file.mtime) {
                continue;
            }
            self.ledger.insert(file.path.clone(), file.mtime);
            changed.push(file);
        }
        changed
    }

    /// One polling pass. Returns how many files were dispatched.
    pub async fn tick(&mut self) -> usize {
        let changed = self.poll().await;
        let mode = self.mode();
        for file in &changed {
            info!(path = %file.path, mtime = file.mtime, "[WATCH] Modified file");
            let outcome = self.coordinator.process(file, mode).await;
            debug!(path = %file.path, ?outcome, "[WATCH] Dispatch finished");
        }
        changed.len()
    }
}

/// Handle to a running watcher loop.
pub struct WatcherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Cancel the timer. A tick already running finishes on its own and is
    /// not awaited here. Dropping the handle has the same effect.
    pub fn stop(&self) {
        if self.stop.send(true).is_ok() {
            info!("[WATCH] Stop requested");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start polling every `period` on the current tokio runtime.
pub fn spawn<S, N, T>(coordinator: Arc<ProcessingCoordinator<S, N, T>>, period: Duration) -> WatcherHandle
where
    S: Storage + 'static,
    N: Notifier + 'static,
    T: Transport + 'static,
{
    let (stop, mut stop_rx) = watch::channel(false);
    let mut watcher = Watcher::new(coordinator);
    info!(period_secs = period.as_secs_f64(), mode = ?watcher.mode(), "[WATCH] Watcher started");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = ticker.tick() => {
                    watcher.tick().await;
                }
            }
        }
        info!("[WATCH] Watcher stopped");
    });

    WatcherHandle { stop, task }
}
