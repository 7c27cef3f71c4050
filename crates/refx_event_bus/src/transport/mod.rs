//! Message transports
//!
//! The dispatch loop only needs something it can poll with a bounded wait
//! ([`MessageSource`]); publishers only need [`Publish`]. Redis pub/sub is the
//! cross-process implementation, [`local`] the in-process one.

pub mod local;
pub mod redis;

use crate::TransportError;
use async_trait::async_trait;
use std::time::Duration;

/// A message as it travels over a transport. The payload format belongs to
/// the channel's handler; the bus never inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// The receiving side of a transport.
///
/// `recv` must be cancel safe: the dispatch loop drops the future when
/// shutdown is requested, and no message may be lost by doing so.
#[async_trait]
pub trait MessageSource: Send {
    /// Waits at most `wait` for the next message. `Ok(None)` means the wait
    /// elapsed without traffic, which is not an error.
    async fn recv(&mut self, wait: Duration) -> Result<Option<BusMessage>, TransportError>;
}

/// The sending side of a transport.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError>;
}
