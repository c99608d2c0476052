//! SwitchBot CLI library
//!
//! Configuration loading, command dispatch and the stdin command intake for
//! the `switchbot` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use app::{run_intake, send_token, IntakeSummary, SwitchbotApp};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
