/// Channel handler trait and the closure adapter
use crate::HandlerError;
use async_trait::async_trait;
use std::future::Future;

/// Something that reacts to the payload of one channel.
///
/// Handlers hold no bus state of their own; whatever they touch (player
/// directory, score storage) is captured when they are constructed.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn handle(&self, payload: &str) -> Result<(), HandlerError>;
    fn handler_name(&self) -> &str;
}

/// Adapts an async closure into a [`ChannelHandler`].
///
/// The closure receives an owned copy of the payload so the returned future
/// does not borrow from the message.
pub struct FnHandler<F> {
    name: String,
    handler: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> ChannelHandler for FnHandler<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: &str) -> Result<(), HandlerError> {
        (self.handler)(payload.to_owned()).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}
