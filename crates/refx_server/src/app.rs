//! Service wiring and lifecycle.

use crate::channels::ChannelNames;
use crate::config::Config;
use crate::handlers::{register_handlers, HandlerDeps};
use crate::sessions::LocalSessions;
use crate::shutdown::cancel_on_signal;
use anyhow::{Context, Result};
use refx_event_bus::{BusError, BusStats, EventBus, HandlerRegistry, MessageSource, RedisSource};
use refx_performance::{ComputeClient, PerformanceFanout};
use refx_scores::{PgScoreRepository, RankingEngine, ScoreRepository};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Long-lived collaborators shared by the handlers and score submission.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<LocalSessions>,
    pub ranking: RankingEngine,
    pub performance: PerformanceFanout,
}

impl Services {
    /// Builds the production services from `config`. No connection is opened
    /// here; the database pool and HTTP client connect on first use.
    pub fn from_config(config: &Config) -> Result<Self> {
        let repository: Arc<dyn ScoreRepository> = Arc::new(
            PgScoreRepository::from_url(&config.database.url, config.database.max_connections)
                .context("creating score database pool")?,
        );
        let client = ComputeClient::new(config.compute_config())
            .context("creating performance service client")?;
        info!("Performance service endpoint: {}", client.endpoint());

        let sessions = Arc::new(LocalSessions::new());
        sessions.create_room(&config.bus.announce_room);

        Ok(Self {
            sessions,
            ranking: RankingEngine::new(repository),
            performance: PerformanceFanout::new(Arc::new(client))
                .with_max_in_flight(config.performance.max_in_flight),
        })
    }
}

pub struct Application {
    config: Config,
    services: Services,
    bus: Arc<EventBus>,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: Config, services: Services) -> Self {
        let names = ChannelNames::new(config.bus.channel_prefix.clone());
        let deps = HandlerDeps {
            directory: services.sessions.clone(),
            ranking: services.ranking.clone(),
            announce_room: config.bus.announce_room.clone(),
        };

        let mut registry = HandlerRegistry::new();
        register_handlers(&mut registry, &names, &deps);
        let bus = Arc::new(EventBus::new(registry, config.bus_config()));

        Self {
            config,
            services,
            bus,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Token that stops the application when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribes to every registered channel on Redis and runs until a
    /// termination signal arrives.
    pub async fn run(self) -> Result<()> {
        let channels = self.bus.registry().channels();
        let client = redis::Client::open(self.config.redis.url.as_str())
            .with_context(|| format!("invalid redis url {}", self.config.redis.url))?;
        let source = RedisSource::subscribe(&client, &channels)
            .await
            .context("subscribing to redis channels")?;

        cancel_on_signal(self.shutdown.clone());
        self.run_with_source(source).await
    }

    /// Runs the dispatch loop over `source` until the shutdown token is
    /// cancelled or the source closes.
    pub async fn run_with_source<S>(self, source: S) -> Result<()>
    where
        S: MessageSource + 'static,
    {
        info!(
            "refx coordination service running with {} channels: {:?}",
            self.bus.registry().len(),
            self.bus.registry().channels()
        );

        let monitor = spawn_stats_monitor(self.bus.stats_handle(), STATS_INTERVAL, self.shutdown.clone());
        let result = self.bus.clone().spawn(source, self.shutdown.clone()).await;
        self.shutdown.cancel();
        monitor.await.ok();

        let stats = self.bus.stats();
        info!(
            "Final statistics: {} received, {} delivered, {} unrouted, {} failed, {} panicked",
            stats.received, stats.delivered, stats.unrouted, stats.failed, stats.panicked
        );

        match result.context("event bus task panicked")? {
            Ok(()) => {
                info!("refx coordination service shutdown complete");
                Ok(())
            }
            Err(BusError::SourceClosed) => {
                error!("Message source closed unexpectedly");
                Err(BusError::SourceClosed.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Logs bus throughput every `interval` until `shutdown` is cancelled.
pub fn spawn_stats_monitor(
    stats: Arc<BusStats>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut last = stats.snapshot();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now = stats.snapshot();
            let received = now.received - last.received;
            let failures = now.failures() - last.failures();
            info!(
                "Bus health - {} messages/{}s | {} failures | {} transport errors total",
                received,
                interval.as_secs(),
                failures,
                now.transport_errors
            );
            if failures > 0 {
                warn!("{} handler failures in the last {}s", failures, interval.as_secs());
            }
            last = now;
        }
    })
}
