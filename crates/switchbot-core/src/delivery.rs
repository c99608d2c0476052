//! Resilient command delivery across candidate devices
//!
//! The coordinator sweeps the configured candidate addresses in order,
//! connecting, writing the command payload and disconnecting, until one write
//! completes or every cycle has been exhausted. Each attempt is bounded by the
//! configured connect and write timeouts, and every successful connect is
//! released before the next candidate is tried.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::command::{Command, Payload};
use crate::config::DeliveryConfig;
use crate::errors::{ConnectError, WriteError};
use crate::transport::{BotTransport, DeviceAddress};

/// Diagnostic reported when there is nothing to try
pub const NO_CANDIDATES_DIAGNOSTIC: &str = "no candidate addresses configured";

// ----------------------------------------------------------------------------
// Delivery Records
// ----------------------------------------------------------------------------

/// Result kind of a single (address, command) attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    ConnectFailed,
    WriteFailed,
}

/// One connect-write-disconnect attempt against a candidate address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// 1-based cycle the attempt belongs to
    pub cycle: u32,
    pub address: DeviceAddress,
    pub command: Command,
    pub outcome: AttemptOutcome,
    /// Failure detail, absent on success
    pub diagnostic: Option<String>,
}

impl DeliveryAttempt {
    fn succeeded(cycle: u32, address: &DeviceAddress, command: Command) -> Self {
        Self {
            cycle,
            address: address.clone(),
            command,
            outcome: AttemptOutcome::Success,
            diagnostic: None,
        }
    }

    fn failed(
        cycle: u32,
        address: &DeviceAddress,
        command: Command,
        outcome: AttemptOutcome,
        diagnostic: String,
    ) -> Self {
        Self {
            cycle,
            address: address.clone(),
            command,
            outcome,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// Final result of delivering one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A write completed on this address
    Delivered { address: DeviceAddress },
    /// Every attempt failed
    Exhausted {
        attempts: usize,
        last_diagnostic: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered { address } => write!(f, "delivered to {}", address),
            DeliveryOutcome::Exhausted {
                attempts,
                last_diagnostic,
            } => write!(
                f,
                "exhausted after {} attempts (last error: {})",
                attempts, last_diagnostic
            ),
        }
    }
}

/// Outcome together with every attempt made to reach it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryReport {
    /// Number of attempts that failed
    pub fn failed_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| !a.is_success()).count()
    }

    /// Attempts made against `address`
    pub fn attempts_for<'a>(
        &'a self,
        address: &'a DeviceAddress,
    ) -> impl Iterator<Item = &'a DeliveryAttempt> + 'a {
        self.attempts.iter().filter(move |a| &a.address == address)
    }

    /// Number of cycles started
    pub fn cycles(&self) -> u32 {
        self.attempts.last().map(|a| a.cycle).unwrap_or(0)
    }
}

// ----------------------------------------------------------------------------
// Delivery State
// ----------------------------------------------------------------------------

/// Progress of a single delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Connecting(DeviceAddress),
    WritingPayload(DeviceAddress),
    ConnectFailed(DeviceAddress),
    Delivered(DeviceAddress),
    Exhausted,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered(_) | DeliveryState::Exhausted)
    }

    fn advance(&mut self, next: DeliveryState) {
        debug!(from = ?self, to = ?next, "Delivery state transition");
        *self = next;
    }
}

// ----------------------------------------------------------------------------
// Delivery Coordinator
// ----------------------------------------------------------------------------

/// Drives a [`BotTransport`] across candidate addresses and retry cycles
pub struct DeliveryCoordinator<T: BotTransport> {
    transport: Arc<T>,
    config: DeliveryConfig,
    /// Held for the whole of one delivery
    in_flight: Mutex<()>,
}

impl<T: BotTransport> DeliveryCoordinator<T> {
    /// Create a coordinator over `transport`
    pub fn new(transport: Arc<T>, config: DeliveryConfig) -> Self {
        Self {
            transport,
            config,
            in_flight: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Deliver `command` to the configured candidates
    pub async fn deliver(&self, command: Command) -> DeliveryOutcome {
        self.deliver_with_report(command).await.outcome
    }

    /// Deliver `command` to the configured candidates, keeping every attempt
    pub async fn deliver_with_report(&self, command: Command) -> DeliveryReport {
        self.deliver_to(command, &self.config.addresses, self.config.max_cycles)
            .await
    }

    /// Deliver `command` to an explicit candidate list.
    ///
    /// Candidates are tried strictly in order within each cycle and the first
    /// completed write ends the delivery. Concurrent callers are serialized.
    pub async fn deliver_to(
        &self,
        command: Command,
        addresses: &[DeviceAddress],
        max_cycles: u32,
    ) -> DeliveryReport {
        let _in_flight = self.in_flight.lock().await;

        if addresses.is_empty() {
            warn!(%command, "Cannot deliver command: {}", NO_CANDIDATES_DIAGNOSTIC);
            return DeliveryReport {
                outcome: DeliveryOutcome::Exhausted {
                    attempts: 0,
                    last_diagnostic: NO_CANDIDATES_DIAGNOSTIC.to_string(),
                },
                attempts: Vec::new(),
            };
        }

        let payload = command.payload();
        let mut state = DeliveryState::Idle;
        let mut attempts = Vec::with_capacity(addresses.len());

        for cycle in 1..=max_cycles {
            for address in addresses {
                let attempt = self
                    .attempt(cycle, address, command, &payload, &mut state)
                    .await;
                let delivered = attempt.is_success();
                attempts.push(attempt);

                if delivered {
                    state.advance(DeliveryState::Delivered(address.clone()));
                    info!(
                        %address,
                        %command,
                        cycle,
                        attempts = attempts.len(),
                        "Command delivered"
                    );
                    return DeliveryReport {
                        outcome: DeliveryOutcome::Delivered {
                            address: address.clone(),
                        },
                        attempts,
                    };
                }
            }

            if cycle < max_cycles && !self.config.retry_delay.is_zero() {
                debug!(cycle, delay = ?self.config.retry_delay, "Waiting before next cycle");
                sleep(self.config.retry_delay).await;
            }
        }

        state.advance(DeliveryState::Exhausted);
        let last_diagnostic = attempts
            .last()
            .and_then(|a| a.diagnostic.clone())
            .unwrap_or_else(|| "no delivery cycles attempted".to_string());

        warn!(
            %command,
            attempts = attempts.len(),
            max_cycles,
            "Command delivery exhausted: {}",
            last_diagnostic
        );

        DeliveryReport {
            outcome: DeliveryOutcome::Exhausted {
                attempts: attempts.len(),
                last_diagnostic,
            },
            attempts,
        }
    }

    /// Connect, write and release one candidate
    async fn attempt(
        &self,
        cycle: u32,
        address: &DeviceAddress,
        command: Command,
        payload: &Payload,
        state: &mut DeliveryState,
    ) -> DeliveryAttempt {
        state.advance(DeliveryState::Connecting(address.clone()));
        info!(%address, cycle, "Connecting to Bot at {}...", address);

        let connect_timeout = self.config.connect_timeout;
        let connect_result = match timeout(connect_timeout, self.transport.connect(address)).await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout {
                address: address.to_string(),
                duration_ms: duration_ms(connect_timeout),
            }),
        };

        let mut connection = match connect_result {
            Ok(connection) => connection,
            Err(e) => {
                state.advance(DeliveryState::ConnectFailed(address.clone()));
                warn!(%address, cycle, "Failed to connect: {}", e);
                return DeliveryAttempt::failed(
                    cycle,
                    address,
                    command,
                    AttemptOutcome::ConnectFailed,
                    e.to_string(),
                );
            }
        };

        state.advance(DeliveryState::WritingPayload(address.clone()));
        debug!(
            %address,
            characteristic = %self.config.characteristic,
            %payload,
            "Connected, writing payload"
        );

        let write_timeout = self.config.write_timeout;
        let write_result = match timeout(
            write_timeout,
            self.transport.write_characteristic(
                &mut connection,
                self.config.characteristic,
                payload,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WriteError::Timeout {
                duration_ms: duration_ms(write_timeout),
            }),
        };

        // Released on every path once connected
        match timeout(connect_timeout, self.transport.disconnect(connection)).await {
            Ok(Ok(())) => debug!(%address, "Disconnected"),
            Ok(Err(e)) => warn!(%address, "Disconnect failed: {}", e),
            Err(_) => warn!(%address, "Disconnect timed out after {:?}", connect_timeout),
        }

        match write_result {
            Ok(()) => {
                info!(%address, %command, "Turning {}", command.as_str().to_uppercase());
                DeliveryAttempt::succeeded(cycle, address, command)
            }
            Err(e) => {
                warn!(%address, cycle, "Failed to write command: {}", e);
                DeliveryAttempt::failed(
                    cycle,
                    address,
                    command,
                    AttemptOutcome::WriteFailed,
                    e.to_string(),
                )
            }
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SWITCHBOT_WRITE_CHARACTERISTIC_UUID;
    use crate::testing::{FakeBehavior, FakeBotTransport};

    const AA: &str = "AA:AA";
    const BB: &str = "BB:BB";

    fn addr(s: &str) -> DeviceAddress {
        DeviceAddress::from(s)
    }

    fn coordinator(
        transport: FakeBotTransport,
        addresses: &[&str],
        max_cycles: u32,
    ) -> DeliveryCoordinator<FakeBotTransport> {
        let config = DeliveryConfig::new()
            .with_addresses(addresses.iter().copied())
            .with_max_cycles(max_cycles)
            .with_connect_timeout(Duration::from_secs(2))
            .with_write_timeout(Duration::from_secs(1));
        DeliveryCoordinator::new(Arc::new(transport), config)
    }

    #[tokio::test]
    async fn test_first_address_success_takes_one_attempt() {
        let transport = FakeBotTransport::new().with_behavior(AA, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA, BB], 10);

        let report = coordinator.deliver_with_report(Command::On).await;

        assert_eq!(report.outcome, DeliveryOutcome::Delivered { address: addr(AA) });
        assert_eq!(report.attempts.len(), 1);
        let fake = coordinator.transport();
        assert_eq!(fake.connect_calls(&addr(BB)), 0);
        assert_eq!(
            fake.writes(),
            vec![(addr(AA), SWITCHBOT_WRITE_CHARACTERISTIC_UUID, vec![0x57, 0x01, 0x01])]
        );
    }

    #[tokio::test]
    async fn test_all_connects_fail_exhausts_every_cycle() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailConnect)
            .with_behavior(BB, FakeBehavior::FailConnect);
        let coordinator = coordinator(transport, &[AA, BB], 10);

        let report = coordinator.deliver_with_report(Command::Off).await;

        match &report.outcome {
            DeliveryOutcome::Exhausted { attempts, last_diagnostic } => {
                assert_eq!(*attempts, 20);
                assert!(last_diagnostic.contains(BB));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report.attempts.len(), 20);
        assert_eq!(report.cycles(), 10);
        let fake = coordinator.transport();
        assert_eq!(fake.connect_calls(&addr(AA)), 10);
        assert_eq!(fake.connect_calls(&addr(BB)), 10);
        assert_eq!(fake.total_write_calls(), 0);
        assert_eq!(fake.total_disconnect_calls(), 0);
    }

    #[tokio::test]
    async fn test_later_address_wins_within_first_cycle() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailConnect)
            .with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA, BB], 10);

        let outcome = coordinator.deliver(Command::On).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { address: addr(BB) });
        let fake = coordinator.transport();
        assert_eq!(fake.connect_calls(&addr(AA)), 1);
        assert_eq!(fake.connect_calls(&addr(BB)), 1);
        assert_eq!(fake.disconnect_calls(&addr(BB)), 1);
    }

    #[tokio::test]
    async fn test_scenario_report_records_each_attempt() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailConnect)
            .with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA, BB], 10);

        let command = Command::decode("on").unwrap();
        let report = coordinator.deliver_with_report(command).await;

        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.cycles(), 1);
        assert_eq!(report.failed_attempts(), 1);
        let addr_aa = addr(AA);
        let on_aa: Vec<_> = report.attempts_for(&addr_aa).collect();
        assert_eq!(on_aa.len(), 1);
        assert_eq!(on_aa[0].outcome, AttemptOutcome::ConnectFailed);
        assert!(on_aa[0].diagnostic.is_some());
        let addr_bb = addr(BB);
        let on_bb: Vec<_> = report.attempts_for(&addr_bb).collect();
        assert_eq!(on_bb.len(), 1);
        assert!(on_bb[0].is_success());
        assert_eq!(on_bb[0].diagnostic, None);
    }

    #[tokio::test]
    async fn test_write_failure_still_disconnects_and_moves_on() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailWrite)
            .with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA, BB], 3);

        let report = coordinator.deliver_with_report(Command::Off).await;

        assert_eq!(report.outcome, DeliveryOutcome::Delivered { address: addr(BB) });
        assert_eq!(report.attempts[0].outcome, AttemptOutcome::WriteFailed);
        let fake = coordinator.transport();
        assert_eq!(fake.connect_calls(&addr(AA)), 1);
        assert_eq!(fake.write_calls(&addr(AA)), 1);
        assert_eq!(fake.disconnect_calls(&addr(AA)), 1);
        assert_eq!(fake.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_connect_disconnect_pairing_over_full_exhaustion() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailWrite)
            .with_behavior(BB, FakeBehavior::FailConnect);
        let coordinator = coordinator(transport, &[AA, BB], 4);

        let outcome = coordinator.deliver(Command::On).await;

        assert!(!outcome.is_delivered());
        let fake = coordinator.transport();
        assert_eq!(fake.successful_connects(&addr(AA)), 4);
        assert_eq!(fake.disconnect_calls(&addr(AA)), 4);
        assert_eq!(fake.disconnect_calls(&addr(BB)), 0);
        assert_eq!(fake.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_empty_address_list_makes_no_transport_calls() {
        let coordinator = coordinator(FakeBotTransport::new(), &[], 10);

        let outcome = coordinator.deliver(Command::On).await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Exhausted {
                attempts: 0,
                last_diagnostic: NO_CANDIDATES_DIAGNOSTIC.to_string(),
            }
        );
        let fake = coordinator.transport();
        assert_eq!(fake.total_connect_calls(), 0);
        assert_eq!(fake.total_write_calls(), 0);
    }

    #[tokio::test]
    async fn test_success_in_later_cycle() {
        let transport =
            FakeBotTransport::new().with_behavior(AA, FakeBehavior::SucceedAfter(3));
        let coordinator = coordinator(transport, &[AA], 10);

        let report = coordinator.deliver_with_report(Command::On).await;

        assert!(report.outcome.is_delivered());
        assert_eq!(report.attempts.len(), 4);
        assert_eq!(report.cycles(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_connect_is_bounded_by_timeout() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::HangConnect)
            .with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA, BB], 2);

        let report = coordinator.deliver_with_report(Command::On).await;

        assert_eq!(report.outcome, DeliveryOutcome::Delivered { address: addr(BB) });
        let diagnostic = report.attempts[0].diagnostic.clone().unwrap();
        assert!(diagnostic.contains("timed out after 2000ms"), "{diagnostic}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_write_is_bounded_and_released() {
        let transport = FakeBotTransport::new().with_behavior(AA, FakeBehavior::HangWrite);
        let coordinator = coordinator(transport, &[AA], 2);

        let report = coordinator.deliver_with_report(Command::Off).await;

        assert_eq!(
            report.outcome,
            DeliveryOutcome::Exhausted {
                attempts: 2,
                last_diagnostic: "Write timed out after 1000ms".to_string(),
            }
        );
        assert_eq!(coordinator.transport().disconnect_calls(&addr(AA)), 2);
        assert_eq!(coordinator.transport().open_connections(), 0);
    }

    #[tokio::test]
    async fn test_failed_disconnect_does_not_change_outcome() {
        let transport = FakeBotTransport::new().with_behavior(AA, FakeBehavior::FailDisconnect);
        let coordinator = coordinator(transport, &[AA], 10);

        let outcome = coordinator.deliver(Command::On).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered { address: addr(AA) });
        assert_eq!(coordinator.transport().disconnect_calls(&addr(AA)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_between_cycles_only() {
        let transport = FakeBotTransport::new().with_behavior(AA, FakeBehavior::FailConnect);
        let config = DeliveryConfig::new()
            .with_addresses([AA])
            .with_max_cycles(3)
            .with_retry_delay(Duration::from_secs(5));
        let coordinator = DeliveryCoordinator::new(Arc::new(transport), config);

        let started = tokio::time::Instant::now();
        let outcome = coordinator.deliver(Command::On).await;

        assert!(!outcome.is_delivered());
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_deliver_to_explicit_candidates() {
        let transport = FakeBotTransport::new().with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = coordinator(transport, &[AA], 10);

        let report = coordinator
            .deliver_to(Command::Off, &[addr(BB)], 1)
            .await;

        assert_eq!(report.outcome, DeliveryOutcome::Delivered { address: addr(BB) });
        assert_eq!(coordinator.transport().connect_calls(&addr(AA)), 0);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_are_serialized() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::FailConnect)
            .with_behavior(BB, FakeBehavior::AlwaysSucceed);
        let coordinator = Arc::new(coordinator(transport, &[AA, BB], 10));

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.deliver(Command::On).await }
        });
        let second = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.deliver(Command::Off).await }
        });

        assert!(first.await.unwrap().is_delivered());
        assert!(second.await.unwrap().is_delivered());
        assert_eq!(coordinator.transport().max_concurrent_connections(), 1);
    }

    #[tokio::test]
    async fn test_second_delivery_waits_behind_in_flight_one() {
        let transport = FakeBotTransport::new().with_behavior(AA, FakeBehavior::HangConnect);
        let coordinator = coordinator(transport, &[AA], 1);

        let mut first = tokio_test::task::spawn(coordinator.deliver(Command::On));
        let mut second = tokio_test::task::spawn(coordinator.deliver(Command::Off));

        tokio_test::assert_pending!(first.poll());
        tokio_test::assert_pending!(second.poll());
        assert_eq!(coordinator.transport().total_connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_releases_half_open_link() {
        let transport = FakeBotTransport::new()
            .with_behavior(AA, FakeBehavior::HangAfterConnect)
            .with_behavior(BB, FakeBehavior::HangAfterConnect);
        let coordinator = coordinator(transport, &[AA, BB], 1);

        let outcome = coordinator.deliver(Command::On).await;

        match outcome {
            DeliveryOutcome::Exhausted { attempts, last_diagnostic } => {
                assert_eq!(attempts, 2);
                assert!(last_diagnostic.contains("timed out"), "{last_diagnostic}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let fake = coordinator.transport();
        assert_eq!(fake.successful_connects(&addr(AA)), 1);
        assert_eq!(fake.abandoned_links(), 2);
        assert_eq!(fake.open_connections(), 0);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_terminal_states() {
        assert!(DeliveryState::Delivered(addr(AA)).is_terminal());
        assert!(DeliveryState::Exhausted.is_terminal());
        assert!(!DeliveryState::Connecting(addr(AA)).is_terminal());
        assert!(!DeliveryState::Idle.is_terminal());
    }

    #[test]
    fn test_outcome_display() {
        let outcome = DeliveryOutcome::Exhausted {
            attempts: 20,
            last_diagnostic: "Device BB:BB not found".into(),
        };
        assert_eq!(
            outcome.to_string(),
            "exhausted after 20 attempts (last error: Device BB:BB not found)"
        );
    }
}
