//! SwitchBot application wiring
//!
//! Connects configuration, the BLE transport and the delivery coordinator,
//! and runs the line-based command intake.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use switchbot_ble::BleBotTransport;
use switchbot_core::{
    BotTransport, Command, CommandIntake, DeliveryCoordinator, DeliveryOutcome, IntakeEvent,
    SwitchbotError,
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// SwitchBot controller backed by the host BLE adapter
pub struct SwitchbotApp {
    coordinator: Arc<DeliveryCoordinator<BleBotTransport>>,
}

impl SwitchbotApp {
    /// Initialize the BLE transport and delivery coordinator
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let transport = BleBotTransport::new(config.ble_config()).await?;
        let delivery = config.delivery_config();
        info!(
            candidates = delivery.addresses.len(),
            max_cycles = delivery.max_cycles,
            "SwitchBot controller ready"
        );
        Ok(Self {
            coordinator: Arc::new(DeliveryCoordinator::new(Arc::new(transport), delivery)),
        })
    }

    pub fn coordinator(&self) -> &Arc<DeliveryCoordinator<BleBotTransport>> {
        &self.coordinator
    }

    pub fn transport(&self) -> &BleBotTransport {
        self.coordinator.transport()
    }
}

// ----------------------------------------------------------------------------
// Delivery Entry Points
// ----------------------------------------------------------------------------

/// Decode `token` and deliver it, failing if every attempt is exhausted
pub async fn send_token<T: BotTransport>(
    coordinator: &DeliveryCoordinator<T>,
    token: &str,
) -> Result<DeliveryOutcome> {
    let command = Command::decode(token)?;
    let outcome = coordinator.deliver(command).await;
    match outcome {
        DeliveryOutcome::Delivered { .. } => Ok(outcome),
        DeliveryOutcome::Exhausted { .. } => Err(CliError::DeliveryFailed(outcome.to_string())),
    }
}

/// Counters reported when the intake stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    /// Tokens accepted and queued
    pub submitted: usize,
    /// Tokens rejected as unrecognized
    pub rejected: usize,
    pub delivered: usize,
    pub exhausted: usize,
}

/// Feed one command token per line from `reader` through the single-worker
/// intake until end of input or `shutdown` resolves.
///
/// Blank lines are ignored. Queued commands are drained before returning.
pub async fn run_intake<T, R, S>(
    coordinator: Arc<DeliveryCoordinator<T>>,
    reader: R,
    shutdown: S,
) -> Result<IntakeSummary>
where
    T: BotTransport + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let (handle, worker) = CommandIntake::spawn(coordinator);
    let reporter = tokio::spawn(report_outcomes(handle.subscribe()));

    let mut summary = IntakeSummary::default();
    let mut lines = reader.lines();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting commands");
                break;
            }
        };

        let Some(token) = line else {
            debug!("Command input closed");
            break;
        };
        if token.is_empty() {
            continue;
        }

        match handle.submit(&token).await {
            Ok(_) => summary.submitted += 1,
            Err(SwitchbotError::UnrecognizedCommand { token }) => {
                warn!("Ignoring unrecognized command {:?}", token);
                summary.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    drop(handle);
    match worker.await {
        Ok(stats) => {
            summary.delivered = stats.delivered;
            summary.exhausted = stats.exhausted;
        }
        Err(e) => warn!("Intake worker ended abnormally: {}", e),
    }
    if let Err(e) = reporter.await {
        warn!("Outcome reporter ended abnormally: {}", e);
    }

    info!(
        submitted = summary.submitted,
        rejected = summary.rejected,
        delivered = summary.delivered,
        exhausted = summary.exhausted,
        "Command intake stopped"
    );
    Ok(summary)
}

/// Log each completed command
async fn report_outcomes(mut events: broadcast::Receiver<IntakeEvent>) {
    loop {
        match events.recv().await {
            Ok(IntakeEvent::Completed { command, report }) => {
                if report.outcome.is_delivered() {
                    info!(%command, attempts = report.attempts.len(), "{}", report.outcome);
                } else {
                    warn!(%command, "{}", report.outcome);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Outcome reporter lagged, {} outcomes not logged", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
