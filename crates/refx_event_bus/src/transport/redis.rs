//! Redis pub/sub transport.

use super::{BusMessage, MessageSource, Publish};
use crate::TransportError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::pin::Pin;
use std::time::Duration;
use tracing::info;

type MessageStream = Pin<Box<dyn Stream<Item = redis::Msg> + Send>>;

/// Subscriber side: a dedicated pub/sub connection subscribed to a fixed set
/// of channels.
pub struct RedisSource {
    channels: Vec<String>,
    messages: MessageStream,
}

impl std::fmt::Debug for RedisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSource")
            .field("channels", &self.channels)
            .finish()
    }
}

impl RedisSource {
    /// Opens a pub/sub connection and subscribes to every channel in `channels`.
    pub async fn subscribe(
        client: &redis::Client,
        channels: &[String],
    ) -> Result<Self, TransportError> {
        let mut pubsub = client.get_async_pubsub().await?;
        for channel in channels {
            pubsub.subscribe(channel.as_str()).await?;
        }
        info!("Subscribed to {} redis channels: {:?}", channels.len(), channels);

        Ok(Self {
            channels: channels.to_vec(),
            messages: Box::pin(pubsub.into_on_message()),
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }
}

#[async_trait]
impl MessageSource for RedisSource {
    async fn recv(&mut self, wait: Duration) -> Result<Option<BusMessage>, TransportError> {
        match tokio::time::timeout(wait, self.messages.next()).await {
            Err(_elapsed) => Ok(None),
            Ok(None) => Err(TransportError::Closed),
            Ok(Some(msg)) => Ok(Some(BusMessage::new(
                msg.get_channel_name(),
                msg.get_payload_bytes(),
            ))),
        }
    }
}

/// Publisher side, sharing one multiplexed connection that reconnects on its own.
#[derive(Clone)]
pub struct RedisPublisher {
    connection: ConnectionManager,
}

impl RedisPublisher {
    pub async fn connect(client: redis::Client) -> Result<Self, TransportError> {
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl Publish for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut connection = self.connection.clone();
        let _receivers: i64 = connection.publish(channel, payload).await?;
        Ok(())
    }
}
