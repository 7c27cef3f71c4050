/// The event bus service and its dispatch loop
use crate::registry::HandlerRegistry;
use crate::stats::{BusStats, BusStatsSnapshot};
use crate::transport::{BusMessage, MessageSource};
use crate::{BusError, HandlerError, TransportError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Timing knobs for the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Upper bound on a single wait for the next message
    pub poll_timeout: Duration,
    /// Pause between iterations, whether or not a message was handled
    pub idle_delay: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            idle_delay: Duration::from_millis(10),
        }
    }
}

/// What happened to a single message.
#[derive(Debug)]
pub enum DispatchOutcome {
    Delivered {
        channel: String,
        handler: String,
        elapsed: Duration,
    },
    /// No handler is registered for the channel; the message was dropped
    Unrouted { channel: String },
    Failed {
        channel: String,
        handler: String,
        error: HandlerError,
    },
    Panicked {
        channel: String,
        handler: String,
        message: String,
    },
}

impl DispatchOutcome {
    pub fn channel(&self) -> &str {
        match self {
            Self::Delivered { channel, .. }
            | Self::Unrouted { channel }
            | Self::Failed { channel, .. }
            | Self::Panicked { channel, .. } => channel,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Panicked { .. })
    }
}

/// Owns the channel registry and drives delivery from a [`MessageSource`].
///
/// Handlers run strictly one at a time, in the order messages come off the
/// transport. A failing handler never stops the loop; only cancellation or a
/// closed transport does.
pub struct EventBus {
    registry: Arc<HandlerRegistry>,
    config: BusConfig,
    stats: Arc<BusStats>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

impl EventBus {
    pub fn new(registry: HandlerRegistry, config: BusConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            stats: Arc::new(BusStats::default()),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    pub fn stats(&self) -> BusStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the live counters, for monitoring tasks.
    pub fn stats_handle(&self) -> Arc<BusStats> {
        self.stats.clone()
    }

    /// Routes one message to its handler and reports the outcome.
    ///
    /// Errors and panics raised by the handler are captured here and never
    /// propagate to the caller.
    pub async fn dispatch(&self, message: BusMessage) -> DispatchOutcome {
        let outcome = self.invoke(message).await;
        self.log_outcome(&outcome);
        self.stats.record(&outcome);
        outcome
    }

    async fn invoke(&self, message: BusMessage) -> DispatchOutcome {
        let BusMessage { channel, payload } = message;

        let Some(handler) = self.registry.lookup(&channel) else {
            return DispatchOutcome::Unrouted { channel };
        };
        let handler_name = handler.handler_name().to_owned();

        let payload = match std::str::from_utf8(&payload) {
            Ok(payload) => payload,
            Err(e) => {
                return DispatchOutcome::Failed {
                    channel,
                    handler: handler_name,
                    error: HandlerError::InvalidPayload(format!("payload is not UTF-8: {e}")),
                };
            }
        };

        let started = Instant::now();
        match AssertUnwindSafe(handler.handle(payload)).catch_unwind().await {
            Ok(Ok(())) => DispatchOutcome::Delivered {
                channel,
                handler: handler_name,
                elapsed: started.elapsed(),
            },
            Ok(Err(error)) => DispatchOutcome::Failed {
                channel,
                handler: handler_name,
                error,
            },
            Err(panic) => DispatchOutcome::Panicked {
                channel,
                handler: handler_name,
                message: panic_message(panic.as_ref()),
            },
        }
    }

    fn log_outcome(&self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered {
                channel,
                handler,
                elapsed,
            } => debug!("Handler {} served {} in {:?}", handler, channel, elapsed),
            DispatchOutcome::Unrouted { channel } => {
                trace!("Dropping message on unregistered channel {}", channel)
            }
            DispatchOutcome::Failed {
                channel,
                handler,
                error,
            } => warn!("Handler {} failed on {}: {}", handler, channel, error),
            DispatchOutcome::Panicked {
                channel,
                handler,
                message,
            } => error!("Handler {} panicked on {}: {}", handler, channel, message),
        }
    }

    /// Runs the dispatch loop until `shutdown` is cancelled or the source closes.
    ///
    /// Cancellation is observed while waiting for a message and during the
    /// idle delay, never in the middle of a handler invocation.
    pub async fn run<S>(&self, mut source: S, shutdown: CancellationToken) -> Result<(), BusError>
    where
        S: MessageSource,
    {
        info!(
            "Event bus started: {} channels, poll timeout {:?}",
            self.registry.len(),
            self.config.poll_timeout
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = source.recv(self.config.poll_timeout) => received,
            };

            match received {
                Ok(Some(message)) => {
                    self.dispatch(message).await;
                }
                Ok(None) => {}
                Err(TransportError::Closed) => {
                    warn!("Event bus source closed, stopping dispatch loop");
                    return Err(BusError::SourceClosed);
                }
                Err(e) => {
                    self.stats.record_transport_error();
                    warn!("Event bus receive error: {}", e);
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.idle_delay) => {}
            }
        }

        let stats = self.stats.snapshot();
        info!(
            "Event bus stopped after {} messages ({} failures)",
            stats.received,
            stats.failures()
        );
        Ok(())
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn<S>(
        self: Arc<Self>,
        source: S,
        shutdown: CancellationToken,
    ) -> JoinHandle<Result<(), BusError>>
    where
        S: MessageSource + 'static,
    {
        tokio::spawn(async move { self.run(source, shutdown).await })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{local_bus, FnHandler, Publish};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(name: &'static str, hits: Arc<AtomicUsize>) -> impl crate::ChannelHandler + 'static {
        FnHandler::new(name, move |_payload: String| {
            hits.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok::<(), HandlerError>(()))
        })
    }

    fn fast_config() -> BusConfig {
        BusConfig {
            poll_timeout: Duration::from_millis(20),
            idle_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_dispatch_delivers_to_registered_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register("refx:refresh_stats", counting_handler("refresh", hits.clone()));
        let bus = EventBus::new(registry, fast_config());

        let outcome = bus.dispatch(BusMessage::new("refx:refresh_stats", "3")).await;

        assert!(matches!(outcome, DispatchOutcome::Delivered { ref handler, .. } if handler == "refresh"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_dropped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register("refx:notify", counting_handler("notify", hits.clone()));
        let bus = EventBus::new(registry, fast_config());

        let outcome = bus.dispatch(BusMessage::new("refx:unknown", "1|hi")).await;

        assert!(matches!(outcome, DispatchOutcome::Unrouted { .. }));
        assert!(!outcome.is_failure());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.stats().unrouted, 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_captured() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "refx:restrict",
            FnHandler::new("restrict", |_payload: String| async {
                Err::<(), _>(HandlerError::execution("player directory unavailable"))
            }),
        );
        let bus = EventBus::new(registry, fast_config());

        let outcome = bus.dispatch(BusMessage::new("refx:restrict", "1|cheating")).await;

        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert_eq!(bus.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_handler_panic_is_captured() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "refx:announce",
            FnHandler::new("announce", |payload: String| async move {
                if payload.is_empty() {
                    return Ok::<(), HandlerError>(());
                }
                panic!("score {payload} vanished");
            }),
        );
        let bus = EventBus::new(registry, fast_config());

        let outcome = bus.dispatch(BusMessage::new("refx:announce", "77")).await;

        match outcome {
            DispatchOutcome::Panicked { message, .. } => assert_eq!(message, "score 77 vanished"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(bus.stats().panicked, 1);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_fails_without_invoking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register("refx:notify", counting_handler("notify", hits.clone()));
        let bus = EventBus::new(registry, fast_config());

        let outcome = bus
            .dispatch(BusMessage::new("refx:notify", vec![0xff, 0xfe]))
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed { error: HandlerError::InvalidPayload(_), .. }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let (_publisher, source) = local_bus();
        let bus = Arc::new(EventBus::new(HandlerRegistry::new(), fast_config()));
        let shutdown = CancellationToken::new();
        let task = bus.clone().spawn(source, shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop did not stop")
            .expect("loop task panicked");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_reports_closed_source() {
        let (publisher, source) = local_bus();
        drop(publisher);
        let bus = EventBus::new(HandlerRegistry::new(), fast_config());

        let result = bus.run(source, CancellationToken::new()).await;
        assert!(matches!(result, Err(BusError::SourceClosed)));
    }

    #[tokio::test]
    async fn test_run_survives_failing_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register(
            "refx:restrict",
            FnHandler::new("restrict", |_payload: String| async {
                Err::<(), _>(HandlerError::execution("boom"))
            }),
        );
        registry.register("refx:notify", counting_handler("notify", hits.clone()));

        let (publisher, source) = local_bus();
        let bus = Arc::new(EventBus::new(registry, fast_config()));
        let shutdown = CancellationToken::new();
        let task = bus.clone().spawn(source, shutdown.clone());

        for _ in 0..5 {
            publisher.publish("refx:restrict", b"1|x").await.unwrap();
        }
        publisher.publish("refx:notify", b"1|still alive").await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while hits.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("notify was never delivered");

        shutdown.cancel();
        task.await.unwrap().unwrap();

        let stats = bus.stats();
        assert_eq!(stats.failed, 5);
        assert_eq!(stats.delivered, 1);
    }
}
