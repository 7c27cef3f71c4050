//! # refx Event Bus
//!
//! Cross-process event propagation for the game server backend. Other server
//! processes publish small messages on named channels; every process runs one
//! [`EventBus`] loop that receives them and hands each payload to the handler
//! registered for its channel.
//!
//! ## Building blocks
//!
//! - [`HandlerRegistry`] maps channel names to [`ChannelHandler`]s. It is filled
//!   during startup and frozen inside the bus, so lookups never lock.
//! - [`EventBus`] owns the registry and the dispatch loop. A handler that
//!   returns an error or panics is reported as a [`DispatchOutcome`]; the loop
//!   itself keeps running.
//! - [`MessageSource`] / [`Publish`] abstract the transport. Redis pub/sub is
//!   the production transport ([`RedisSource`], [`RedisPublisher`]); the
//!   in-process [`local_bus`] pair is used for single-process setups and tests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use refx_event_bus::*;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), BusError> {
//! let mut registry = HandlerRegistry::new();
//! registry.register("refx:notify", FnHandler::new("notify", |payload: String| async move {
//!     println!("notify: {payload}");
//!     Ok::<(), HandlerError>(())
//! }));
//!
//! let (publisher, source) = local_bus();
//! let bus = Arc::new(EventBus::new(registry, BusConfig::default()));
//! let shutdown = CancellationToken::new();
//! let task = bus.clone().spawn(source, shutdown.clone());
//!
//! publisher.publish("refx:notify", b"1000|hello").await?;
//! shutdown.cancel();
//! task.await.expect("bus task panicked")?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod handler;
pub mod registry;
pub mod stats;
pub mod transport;

pub use dispatch::{BusConfig, DispatchOutcome, EventBus};
pub use handler::{ChannelHandler, FnHandler};
pub use registry::HandlerRegistry;
pub use stats::{BusStats, BusStatsSnapshot};
pub use transport::local::{local_bus, LocalPublisher, LocalSource};
pub use transport::redis::{RedisPublisher, RedisSource};
pub use transport::{BusMessage, MessageSource, Publish};

/// Boxed error type carried by [`HandlerError::Execution`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors a channel handler reports back to the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload could not be decoded into what the handler expects
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    /// The handler understood the payload but failed while acting on it
    #[error("Handler execution error: {0}")]
    Execution(BoxError),
}

impl HandlerError {
    /// Wraps any error (or message) as an execution failure.
    pub fn execution<E: Into<BoxError>>(error: E) -> Self {
        Self::Execution(error.into())
    }
}

/// Errors raised by a transport while receiving or publishing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    /// The underlying subscription or channel is gone and will not produce more messages
    #[error("Transport closed")]
    Closed,
}

/// Errors that stop the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Message source closed")]
    SourceClosed,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
