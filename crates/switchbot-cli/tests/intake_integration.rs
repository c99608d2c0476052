//! End-to-end tests for the line-based command intake
//!
//! Runs the CLI intake loop against the scripted fake transport to check
//! ordering, rejection of bad tokens and connect/disconnect pairing.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;

use switchbot_cli::{run_intake, send_token, CliError, IntakeSummary};
use switchbot_core::testing::{FakeBehavior, FakeBotTransport};
use switchbot_core::{DeliveryConfig, DeliveryCoordinator, DeliveryOutcome, DeviceAddress};

// ----------------------------------------------------------------------------
// Test Helpers
// ----------------------------------------------------------------------------

fn coordinator(
    transport: FakeBotTransport,
    addresses: &[&str],
) -> Arc<DeliveryCoordinator<FakeBotTransport>> {
    let config = DeliveryConfig::new()
        .with_addresses(addresses.iter().copied())
        .with_connect_timeout(Duration::from_secs(1))
        .with_write_timeout(Duration::from_secs(1));
    Arc::new(DeliveryCoordinator::new(Arc::new(transport), config))
}

fn scenario_transport() -> FakeBotTransport {
    FakeBotTransport::new()
        .with_behavior("AA:AA", FakeBehavior::FailConnect)
        .with_behavior("BB:BB", FakeBehavior::AlwaysSucceed)
}

// ----------------------------------------------------------------------------
// Intake Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_intake_delivers_each_line_in_order() {
    let coordinator = coordinator(scenario_transport(), &["AA:AA", "BB:BB"]);
    let input = "on\n\noff\r\non\n";

    let summary = run_intake(
        Arc::clone(&coordinator),
        BufReader::new(input.as_bytes()),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        IntakeSummary {
            submitted: 3,
            rejected: 0,
            delivered: 3,
            exhausted: 0,
        }
    );

    let fake = coordinator.transport();
    let payloads: Vec<u8> = fake.writes().iter().map(|(_, _, bytes)| bytes[2]).collect();
    assert_eq!(payloads, vec![0x01, 0x02, 0x01]);
    assert_eq!(fake.connect_calls(&DeviceAddress::from("AA:AA")), 3);
    assert_eq!(fake.open_connections(), 0);
}

#[tokio::test]
async fn test_intake_skips_unrecognized_tokens() {
    let coordinator = coordinator(scenario_transport(), &["BB:BB"]);
    let input = "ON\n off\npress\noff\n";

    let summary = run_intake(
        Arc::clone(&coordinator),
        BufReader::new(input.as_bytes()),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.submitted, 1);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.delivered, 1);
    assert_eq!(coordinator.transport().total_connect_calls(), 1);
}

#[tokio::test]
async fn test_intake_counts_exhausted_commands() {
    let transport = FakeBotTransport::new().with_behavior("AA:AA", FakeBehavior::FailWrite);
    let coordinator = coordinator(transport, &["AA:AA"]);

    let summary = run_intake(
        Arc::clone(&coordinator),
        BufReader::new("off\n".as_bytes()),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.exhausted, 1);
    let fake = coordinator.transport();
    let address = DeviceAddress::from("AA:AA");
    assert_eq!(fake.write_calls(&address), 10);
    assert_eq!(fake.disconnect_calls(&address), 10);
}

#[tokio::test]
async fn test_intake_summary_counts_every_completed_command() {
    let coordinator = coordinator(scenario_transport(), &["BB:BB"]);
    let input = "on\noff\n".repeat(60);

    let summary = run_intake(
        Arc::clone(&coordinator),
        BufReader::new(input.as_bytes()),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    assert_eq!(summary.submitted, 120);
    assert_eq!(summary.delivered, 120);
    assert_eq!(summary.exhausted, 0);
    assert_eq!(coordinator.transport().total_write_calls(), 120);
}

#[tokio::test]
async fn test_intake_stops_on_shutdown() {
    let coordinator = coordinator(scenario_transport(), &["BB:BB"]);
    let (_writer, reader) = tokio::io::duplex(64);

    let summary = run_intake(
        Arc::clone(&coordinator),
        BufReader::new(reader),
        std::future::ready(()),
    )
    .await
    .unwrap();

    assert_eq!(summary, IntakeSummary::default());
    assert_eq!(coordinator.transport().total_connect_calls(), 0);
}

// ----------------------------------------------------------------------------
// Send Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_send_scenario_delivers_to_second_candidate() {
    let coordinator = coordinator(scenario_transport(), &["AA:AA", "BB:BB"]);

    let outcome = send_token(&coordinator, "on").await.unwrap();

    assert_eq!(
        outcome,
        DeliveryOutcome::Delivered {
            address: DeviceAddress::from("BB:BB")
        }
    );
    let fake = coordinator.transport();
    assert_eq!(fake.connect_calls(&DeviceAddress::from("AA:AA")), 1);
    assert_eq!(fake.connect_calls(&DeviceAddress::from("BB:BB")), 1);
}

#[tokio::test]
async fn test_send_rejects_bad_token_without_transport_calls() {
    let coordinator = coordinator(scenario_transport(), &["BB:BB"]);

    let err = send_token(&coordinator, "Off").await.unwrap_err();

    assert!(matches!(err, CliError::Core(_)));
    assert_eq!(coordinator.transport().total_connect_calls(), 0);
}

#[tokio::test]
async fn test_send_reports_exhaustion_as_error() {
    let coordinator = coordinator(FakeBotTransport::new(), &["CC:CC", "DD:DD"]);

    let err = send_token(&coordinator, "off").await.unwrap_err();

    match err {
        CliError::DeliveryFailed(message) => {
            assert!(message.contains("exhausted after 20 attempts"), "{message}")
        }
        other => panic!("unexpected error {other:?}"),
    }
}
