/// Channel name to handler mapping
use crate::handler::ChannelHandler;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps each channel to exactly one handler.
///
/// Registration takes `&mut self`, so it can only happen while the registry is
/// still owned by startup code. Once handed to [`crate::EventBus`] it is shared
/// immutably and lookups are plain `HashMap` reads.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ChannelHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("channels", &self.channels())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `channel`. A second registration for the same
    /// channel replaces the first.
    pub fn register<H>(&mut self, channel: impl Into<String>, handler: H) -> &mut Self
    where
        H: ChannelHandler + 'static,
    {
        self.register_shared(channel, Arc::new(handler))
    }

    /// Same as [`register`](Self::register) for an already shared handler.
    pub fn register_shared(
        &mut self,
        channel: impl Into<String>,
        handler: Arc<dyn ChannelHandler>,
    ) -> &mut Self {
        let channel = channel.into();
        let name = handler.handler_name().to_owned();
        if let Some(previous) = self.handlers.insert(channel.clone(), handler) {
            debug!(
                "Handler {} for channel {} replaced by {}",
                previous.handler_name(),
                channel,
                name
            );
        } else {
            debug!("Registered handler {} for channel {}", name, channel);
        }
        self
    }

    pub fn lookup(&self, channel: &str) -> Option<Arc<dyn ChannelHandler>> {
        self.handlers.get(channel).cloned()
    }

    /// Registered channel names, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.handlers.keys().cloned().collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnHandler;

    fn named(name: &'static str) -> impl ChannelHandler + 'static {
        FnHandler::new(name, |_payload: String| async { Ok::<(), crate::HandlerError>(()) })
    }

    #[test]
    fn test_lookup_unknown_channel() {
        let registry = HandlerRegistry::new();
        assert!(registry.lookup("refx:missing").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("refx:notify", named("first"))
            .register("refx:notify", named("second"));

        assert_eq!(registry.len(), 1);
        let handler = registry.lookup("refx:notify").expect("handler registered");
        assert_eq!(handler.handler_name(), "second");
    }

    #[test]
    fn test_channels_sorted() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("refx:restrict", named("restrict"))
            .register("refx:announce", named("announce"));

        assert_eq!(registry.channels(), vec!["refx:announce", "refx:restrict"]);
    }
}
