//! Handlers for the coordination channels.
//!
//! Each handler decodes its payload with the [`crate::channels`] codec and
//! acts on the [`PlayerDirectory`]. Handlers only report failures; logging and
//! counting them is the bus's job.

use crate::channels::{parse_id, parse_pair, ChannelNames, Topic};
use crate::sessions::PlayerDirectory;
use async_trait::async_trait;
use refx_event_bus::{ChannelHandler, HandlerError, HandlerRegistry};
use refx_scores::{Mods, RankingEngine, RankingError};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared collaborators handed to every handler.
#[derive(Clone)]
pub struct HandlerDeps {
    pub directory: Arc<dyn PlayerDirectory>,
    pub ranking: RankingEngine,
    /// Room announcements are sent to
    pub announce_room: String,
}

/// Registers one handler per coordination topic under `names`.
pub fn register_handlers(registry: &mut HandlerRegistry, names: &ChannelNames, deps: &HandlerDeps) {
    registry
        .register(
            names.name(Topic::RefreshStats),
            RefreshStatsHandler {
                directory: deps.directory.clone(),
            },
        )
        .register(
            names.name(Topic::Announce),
            AnnounceHandler {
                directory: deps.directory.clone(),
                ranking: deps.ranking.clone(),
                room: deps.announce_room.clone(),
            },
        )
        .register(
            names.name(Topic::Restrict),
            RestrictHandler {
                directory: deps.directory.clone(),
            },
        )
        .register(
            names.name(Topic::Notify),
            NotifyHandler {
                directory: deps.directory.clone(),
            },
        );
}

/// `\x01ACTION achieved #<rank> on <beatmap> [+<mods> ]with <acc>% for <pp>pp.`
pub fn announcement_text(rank: u32, beatmap: &str, mods: Mods, accuracy: f64, pp: f64) -> String {
    let mods = if mods.is_empty() {
        String::new()
    } else {
        format!("+{mods} ")
    };
    format!("\x01ACTION achieved #{rank} on {beatmap} {mods}with {accuracy:.2}% for {pp:?}pp.")
}

pub struct RefreshStatsHandler {
    directory: Arc<dyn PlayerDirectory>,
}

#[async_trait]
impl ChannelHandler for RefreshStatsHandler {
    async fn handle(&self, payload: &str) -> Result<(), HandlerError> {
        let user_id = parse_id(payload)?;
        let player = self
            .directory
            .reload_stats(user_id)
            .await
            .map_err(HandlerError::execution)?;

        if player.restricted {
            debug!("Refreshed stats for restricted player {}, not broadcasting", user_id);
        } else {
            let recipients = self.directory.broadcast_stats(&player).await;
            debug!("Broadcast stats of {} to {} players", user_id, recipients);
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "refresh_stats"
    }
}

pub struct AnnounceHandler {
    directory: Arc<dyn PlayerDirectory>,
    ranking: RankingEngine,
    room: String,
}

#[async_trait]
impl ChannelHandler for AnnounceHandler {
    async fn handle(&self, payload: &str) -> Result<(), HandlerError> {
        let score_id = parse_id(payload)?;
        let (score, rank) = self
            .ranking
            .placement_of(score_id)
            .await
            .map_err(HandlerError::execution)?;
        let beatmap = self
            .ranking
            .repository()
            .beatmap_embed(&score.map_md5)
            .await
            .map_err(|e| HandlerError::execution(RankingError::from(e)))?
            .ok_or_else(|| {
                HandlerError::execution(format!("beatmap {} not found", score.map_md5))
            })?;

        let text = announcement_text(rank, &beatmap, score.mods, score.acc, score.pp);
        if self.directory.send_to_room(&self.room, score.user_id, &text).await {
            info!("Announced score {} (#{} on {})", score_id, rank, beatmap);
        } else {
            debug!("Room {} does not exist, announcement for {} dropped", self.room, score_id);
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "announce"
    }
}

pub struct RestrictHandler {
    directory: Arc<dyn PlayerDirectory>,
}

#[async_trait]
impl ChannelHandler for RestrictHandler {
    async fn handle(&self, payload: &str) -> Result<(), HandlerError> {
        let (user_id, reason) = parse_pair(payload)?;
        self.directory
            .restrict(user_id, reason)
            .await
            .map_err(HandlerError::execution)
    }

    fn handler_name(&self) -> &str {
        "restrict"
    }
}

pub struct NotifyHandler {
    directory: Arc<dyn PlayerDirectory>,
}

#[async_trait]
impl ChannelHandler for NotifyHandler {
    async fn handle(&self, payload: &str) -> Result<(), HandlerError> {
        let (user_id, message) = parse_pair(payload)?;
        self.directory
            .notify(user_id, message)
            .await
            .map_err(HandlerError::execution)
    }

    fn handler_name(&self) -> &str {
        "notify"
    }
}
