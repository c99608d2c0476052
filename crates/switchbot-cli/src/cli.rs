//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Candidate Bot address (repeat for several, tried in order)
    #[arg(short, long = "address", global = true)]
    pub addresses: Vec<String>,

    /// Number of sweeps over the candidates before giving up
    #[arg(long, global = true)]
    pub max_cycles: Option<u32>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Deliver a single command and exit
    Send {
        /// Command token: "on" or "off"
        command: String,
    },
    /// Read one command token per line from stdin and deliver each in turn
    Listen,
    /// List nearby BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
    },
}
