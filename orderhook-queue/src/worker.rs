//! Background polling loop around the processor.

use crate::processor::{Deliverer, Processor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when no job was due
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Single serial worker draining the queue.
///
/// Calls [`Processor::process_once`] back to back while work is found and
/// sleeps `poll_interval` only after an empty pass. Processor errors are
/// logged and the loop keeps going.
pub struct Worker {
    processor: Arc<Processor>,
    deliverer: Arc<dyn Deliverer>,
    config: WorkerConfig,
}

/// Handle to a spawned worker.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop and wait for the current pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(target: "orderhook::worker", error = %e, "worker task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Worker {
    pub fn new(processor: Arc<Processor>, deliverer: Arc<dyn Deliverer>) -> Self {
        Self::with_config(processor, deliverer, WorkerConfig::default())
    }

    pub fn with_config(
        processor: Arc<Processor>,
        deliverer: Arc<dyn Deliverer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            processor,
            deliverer,
            config,
        }
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        WorkerHandle { shutdown: tx, task }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target: "orderhook::worker",
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.processor.process_once(self.deliverer.as_ref()).await {
                Ok(0) => true,
                Ok(attempted) => {
                    debug!(target: "orderhook::worker", attempted, "pass complete");
                    false
                }
                Err(e) => {
                    error!(target: "orderhook::worker", error = %e, "processor pass failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "orderhook::worker", "worker stopped");
    }
}
