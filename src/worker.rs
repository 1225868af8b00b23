// worker.rs
use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    commands::{self, CommandQueue, Dequeued, ShutdownListener},
    error::AppError,
    models::{Command, Readiness, WorkerChannels},
    session::{DeviceBinding, SessionManager},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Background task owning the cloud session and the bound device. Commands
/// are applied one at a time in queue order.
pub struct Worker {
    manager: SessionManager,
    queue: CommandQueue,
    shutdown: ShutdownListener,
    readiness: Readiness,
    poll_interval: Duration,
    state: watch::Sender<WorkerState>,
}

impl Worker {
    pub fn new(manager: SessionManager, channels: WorkerChannels, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(WorkerState::Starting);
        Self {
            manager,
            queue: channels.queue,
            shutdown: channels.shutdown,
            readiness: channels.readiness,
            poll_interval,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Runs until shutdown is requested or startup fails. The session is
    /// released on every exit path, panics included.
    pub async fn run(mut self) -> Result<(), AppError> {
        let outcome = AssertUnwindSafe(self.serve()).catch_unwind().await;

        self.readiness.set(false);
        if *self.state.borrow() == WorkerState::Running {
            self.transition(WorkerState::Stopping);
        }
        let dropped = self.queue.pending();
        if dropped > 0 {
            warn!(dropped, "Discarding queued commands");
        }
        self.manager.shutdown().await;
        self.transition(WorkerState::Stopped);

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "Worker loop failed");
                Err(e)
            }
            Err(_) => {
                error!("Worker loop panicked");
                Err(AppError::WorkerPanicked)
            }
        }
    }

    async fn serve(&mut self) -> Result<(), AppError> {
        self.manager.initialize().await?;
        let binding = self.manager.discover_device().await?;

        self.readiness.set(true);
        self.transition(WorkerState::Running);

        loop {
            if self.shutdown.is_requested() {
                info!("Shutdown requested");
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                _ = self.shutdown.requested() => None,
                next = self.queue.dequeue(self.poll_interval) => Some(next),
            };

            match next {
                // Picked up by the check at the top of the loop.
                None => continue,
                Some(Dequeued::Command(command)) => self.execute(&binding, command).await,
                Some(Dequeued::Idle) => {}
                Some(Dequeued::Closed) => {
                    info!("Command queue closed");
                    return Ok(());
                }
            }
        }
    }

    async fn execute(&self, binding: &DeviceBinding, command: Command) {
        let operation = command.operation.as_str();
        debug!(operation = %command.operation, outlet = %command.outlet, "Applying command");

        let result = AssertUnwindSafe(commands::apply(command, binding.device()))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Internal(anyhow::anyhow!(
                    "device call panicked"
                )))
            });

        match result {
            Ok(()) => {
                metrics::counter!("meross_commands_applied_total", "operation" => operation)
                    .increment(1);
                info!(
                    operation = %command.operation,
                    outlet = %command.outlet,
                    device = binding.uuid(),
                    "Command applied"
                );
            }
            Err(e) => {
                metrics::counter!("meross_commands_failed_total", "operation" => operation)
                    .increment(1);
                error!(
                    operation = %command.operation,
                    outlet = %command.outlet,
                    device = binding.uuid(),
                    error = %e,
                    "Command failed"
                );
            }
        }
    }

    fn transition(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        info!(from = %previous, to = %next, "Worker state changed");
    }
}
