//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the refx coordination service.
///
/// Every option here overrides the matching value from the configuration file.
#[derive(Parser, Debug, Clone)]
#[command(name = "refx", author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// If the file doesn't exist, a default configuration is written there.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Redis URL used for pub/sub
    #[arg(long, env = "REFX_REDIS_URL")]
    pub redis_url: Option<String>,

    /// Base URL of the performance service
    #[arg(long, env = "REFX_PERFORMANCE_URL")]
    pub performance_url: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            debug: false,
            json_logs: false,
            redis_url: None,
            performance_url: None,
        }
    }
}
