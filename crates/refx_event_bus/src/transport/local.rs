//! In-process transport backed by an unbounded tokio channel.

use super::{BusMessage, MessageSource, Publish};
use crate::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Creates a connected publisher/source pair. The source reports
/// [`TransportError::Closed`] once every publisher clone is dropped.
pub fn local_bus() -> (LocalPublisher, LocalSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LocalPublisher { tx }, LocalSource { rx })
}

#[derive(Debug, Clone)]
pub struct LocalPublisher {
    tx: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Debug)]
pub struct LocalSource {
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

#[async_trait]
impl Publish for LocalPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(BusMessage::new(channel, payload))
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl MessageSource for LocalSource {
    async fn recv(&mut self, wait: Duration) -> Result<Option<BusMessage>, TransportError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Err(_elapsed) => Ok(None),
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(TransportError::Closed),
        }
    }
}
