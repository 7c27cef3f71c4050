//! Configuration loading
//!
//! Settings come from a TOML file and can be overridden from the command line.

pub mod args;
pub mod settings;

pub use args::Args;
pub use settings::{
    BusSettings, Config, DatabaseSettings, LoggingSettings, PerformanceSettings, RedisSettings,
};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Loads the configuration named by `args`, writing a default file first if
/// none exists. Command-line overrides are applied afterwards.
pub async fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        let config_str = tokio::fs::read_to_string(&args.config)
            .await
            .with_context(|| format!("reading {}", args.config.display()))?;
        match toml::from_str::<Config>(&config_str) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file {}: {}", args.config.display(), e);
                return Err(e.into());
            }
        }
    } else {
        warn!(
            "Configuration file not found: {}, using defaults",
            args.config.display()
        );
        let default_config = Config::default();
        let config_str = toml::to_string_pretty(&default_config)?;
        tokio::fs::write(&args.config, config_str).await?;
        info!("Created default configuration file: {}", args.config.display());
        default_config
    };

    apply_overrides(&mut config, args);
    Ok(config)
}

pub fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(url) = &args.redis_url {
        config.redis.url = url.clone();
    }
    if let Some(url) = &args.performance_url {
        config.performance.base_url = url.clone();
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
}
