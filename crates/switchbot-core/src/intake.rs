//! Single-worker command intake
//!
//! Raw command tokens are decoded at submission time and queued for one
//! worker task, which runs each delivery to completion before dequeuing the
//! next. This keeps at most one command in flight per actuator.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::delivery::{DeliveryCoordinator, DeliveryReport};
use crate::errors::{Result, SwitchbotError};
use crate::transport::BotTransport;

/// Default number of commands that may wait behind the one in flight
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Intake Events
// ----------------------------------------------------------------------------

/// Notifications published by the intake worker
#[derive(Debug, Clone)]
pub enum IntakeEvent {
    /// A queued command finished (delivered or exhausted)
    Completed {
        command: Command,
        report: DeliveryReport,
    },
}

/// Totals the worker returns once the queue closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub delivered: usize,
    pub exhausted: usize,
}

impl IntakeStats {
    /// Commands taken off the queue
    pub fn processed(&self) -> usize {
        self.delivered + self.exhausted
    }
}

// ----------------------------------------------------------------------------
// Intake Handle
// ----------------------------------------------------------------------------

/// Cloneable submission side of the intake queue
#[derive(Debug, Clone)]
pub struct IntakeHandle {
    queue: mpsc::Sender<Command>,
    events: broadcast::Sender<IntakeEvent>,
}

impl IntakeHandle {
    /// Decode `token` and queue it for delivery.
    ///
    /// Unrecognized tokens are rejected here and never reach the worker.
    pub async fn submit(&self, token: &str) -> Result<Command> {
        let command = Command::decode(token)?;
        self.submit_command(command).await?;
        Ok(command)
    }

    /// Queue an already decoded command
    pub async fn submit_command(&self, command: Command) -> Result<()> {
        self.queue
            .send(command)
            .await
            .map_err(|_| SwitchbotError::IntakeClosed)?;
        debug!(%command, "Command queued");
        Ok(())
    }

    /// Receive completion events for commands processed after this call
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.events.subscribe()
    }
}

// ----------------------------------------------------------------------------
// Intake Worker
// ----------------------------------------------------------------------------

/// Spawns the worker that owns a delivery coordinator
pub struct CommandIntake;

impl CommandIntake {
    /// Start the worker with the default queue capacity
    pub fn spawn<T>(
        coordinator: Arc<DeliveryCoordinator<T>>,
    ) -> (IntakeHandle, JoinHandle<IntakeStats>)
    where
        T: BotTransport + 'static,
    {
        Self::spawn_with_capacity(coordinator, DEFAULT_QUEUE_CAPACITY)
    }

    /// Start the worker with a bounded queue of `capacity` commands.
    ///
    /// The worker exits once every [`IntakeHandle`] is dropped and the queue
    /// has drained, returning its totals.
    pub fn spawn_with_capacity<T>(
        coordinator: Arc<DeliveryCoordinator<T>>,
        capacity: usize,
    ) -> (IntakeHandle, JoinHandle<IntakeStats>)
    where
        T: BotTransport + 'static,
    {
        let (queue_tx, queue_rx) = mpsc::channel(capacity.max(1));
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let handle = IntakeHandle {
            queue: queue_tx,
            events: events_tx.clone(),
        };
        let worker = tokio::spawn(Self::run(coordinator, queue_rx, events_tx));

        (handle, worker)
    }

    async fn run<T>(
        coordinator: Arc<DeliveryCoordinator<T>>,
        mut queue: mpsc::Receiver<Command>,
        events: broadcast::Sender<IntakeEvent>,
    ) -> IntakeStats
    where
        T: BotTransport + 'static,
    {
        info!("Command intake worker started");
        let mut stats = IntakeStats::default();

        while let Some(command) = queue.recv().await {
            info!(%command, "Processing command");
            let report = coordinator.deliver_with_report(command).await;

            if report.outcome.is_delivered() {
                stats.delivered += 1;
            } else {
                stats.exhausted += 1;
                warn!(%command, "Failed to execute command: {}", report.outcome);
            }

            // No subscribers is not an error
            let _ = events.send(IntakeEvent::Completed { command, report });
        }

        info!(
            delivered = stats.delivered,
            exhausted = stats.exhausted,
            "Command intake closed, worker stopping"
        );
        stats
    }
}
