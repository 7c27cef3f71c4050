//! Logging system setup
//!
//! `RUST_LOG` takes precedence over the configured level. Until the
//! configuration is loaded, events go through a bootstrap subscriber built
//! from the command line alone.

use crate::config::{Args, LoggingSettings};
use anyhow::Result;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Subscriber for events emitted before [`setup_logging`] runs, such as the
/// notices from [`crate::config::load_config`]. Attach it to the loading
/// future with [`tracing::instrument::WithSubscriber`].
pub fn bootstrap_dispatch(args: &Args) -> Dispatch {
    bootstrap_dispatch_with_writer(args, std::io::stdout)
}

pub fn bootstrap_dispatch_with_writer<W>(args: &Args, writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer);

    if args.json_logs {
        Dispatch::new(builder.json().finish())
    } else {
        Dispatch::new(builder.finish())
    }
}

/// Installs the global tracing subscriber.
///
/// Fails if a subscriber is already installed, which only happens when this
/// is called twice in one process.
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json_format {
        registry
            .with(fmt::layer().json().with_target(false).with_thread_names(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .try_init()?;
    }

    Ok(())
}
