//! Server configuration, parsed from the command line.

use crate::storage::ExpiryConfig;
use crate::DEFAULT_ADDR;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "linekv",
    version,
    about = "In-memory key-value store over a line-oriented TCP protocol"
)]
pub struct Config {
    /// Address to listen on
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Command log file; replayed on startup, appended to while serving
    #[arg(long, value_name = "FILE")]
    pub cmdlog: Option<PathBuf>,

    /// Seconds between expiry sweeps
    #[arg(long, value_name = "SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub expire_interval: u64,
}

impl Config {
    pub fn expiry(&self) -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_secs(self.expire_interval),
        }
    }
}
