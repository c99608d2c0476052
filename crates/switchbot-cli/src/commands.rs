//! Command handlers for the SwitchBot CLI

use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tracing::{info, warn};

use crate::app::{run_intake, send_token, SwitchbotApp};
use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Send { command } => Self::handle_send_command(&config, &command).await,
            Commands::Listen => Self::handle_listen_command(&config).await,
            Commands::Scan { seconds } => Self::handle_scan_command(&config, seconds).await,
        }
    }

    /// Handle the send command
    async fn handle_send_command(config: &AppConfig, token: &str) -> Result<()> {
        // Reject bad tokens before touching the adapter
        switchbot_core::Command::decode(token)?;

        let app = SwitchbotApp::new(config).await?;
        let outcome = send_token(app.coordinator(), token).await?;
        println!("{}", outcome);
        Ok(())
    }

    /// Handle the listen command
    async fn handle_listen_command(config: &AppConfig) -> Result<()> {
        let app = SwitchbotApp::new(config).await?;
        info!("Listening for commands on stdin (one of \"on\"/\"off\" per line)");

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        let summary = run_intake(
            Arc::clone(app.coordinator()),
            BufReader::new(tokio::io::stdin()),
            shutdown,
        )
        .await?;

        println!(
            "Processed {} commands: {} delivered, {} exhausted, {} rejected",
            summary.submitted, summary.delivered, summary.exhausted, summary.rejected
        );
        Ok(())
    }

    /// Handle the scan command
    async fn handle_scan_command(config: &AppConfig, seconds: u64) -> Result<()> {
        let app = SwitchbotApp::new(config).await?;
        let devices = app.transport().scan(Duration::from_secs(seconds)).await?;

        if devices.is_empty() {
            println!("No BLE devices found");
            return Ok(());
        }

        println!("{:<40} {:>6}  {:<9} NAME", "ADDRESS", "RSSI", "SWITCHBOT");
        for device in devices {
            let rssi = device
                .rssi
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<40} {:>6}  {:<9} {}",
                device.address,
                rssi,
                if device.is_switchbot { "yes" } else { "" },
                device.name.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }
}
