use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config;

/// Which half of the relay this process runs
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Answerer: captures frames and serves the signaling endpoints
    Sender,
    /// Offerer: submits the offer and persists the inbound stream
    Receiver,
}

#[derive(Parser, Debug)]
#[command(name = "rtc-relay")]
#[command(version)]
#[command(about = "Point-to-point WebRTC media relay", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "rtc-relay.toml")]
    pub config: PathBuf,

    /// Process role
    #[arg(short, long, value_enum)]
    pub role: Role,

    /// Signaling listen address (sender)
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Offer endpoint URL (receiver)
    #[arg(long)]
    pub offer_url: Option<String>,

    /// Output file for the received stream (receiver)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        config::Config::load(&self.config)
    }
}
