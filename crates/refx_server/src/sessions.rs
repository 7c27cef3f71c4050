//! Player directory seen by the event handlers.
//!
//! [`PlayerDirectory`] is what the handlers act on. [`LocalSessions`] is the
//! in-process implementation: accounts with their persisted stats and
//! privileges, the subset currently online with a per-player outbound queue,
//! and chat rooms.

use async_trait::async_trait;
use dashmap::DashMap;
use refx_scores::UNRESTRICTED;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectoryError {
    #[error("player {0} is not online")]
    NotOnline(i64),
    #[error("player {0} does not exist")]
    UnknownPlayer(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlayerStats {
    pub pp: f64,
    pub accuracy: f64,
    pub playcount: u32,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub user_id: i64,
    pub name: String,
    pub restricted: bool,
    pub stats: PlayerStats,
}

/// Something queued for delivery to an online player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    UserStats(PlayerSnapshot),
    Notification { message: String },
    RoomMessage {
        room: String,
        sender_id: i64,
        sender_name: String,
        text: String,
    },
    Restricted { reason: String },
}

/// Operations the coordination handlers perform on players.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Reloads an online player's stats from storage.
    async fn reload_stats(&self, user_id: i64) -> Result<PlayerSnapshot, DirectoryError>;

    /// Queues `player`'s stats for every online player. Returns the number of
    /// recipients.
    async fn broadcast_stats(&self, player: &PlayerSnapshot) -> usize;

    /// Removes the unrestricted privilege. Works for offline accounts too.
    async fn restrict(&self, user_id: i64, reason: &str) -> Result<(), DirectoryError>;

    async fn notify(&self, user_id: i64, message: &str) -> Result<(), DirectoryError>;

    /// Sends `text` to every member of `room`, the sender included. Returns
    /// false when the room does not exist.
    async fn send_to_room(&self, room: &str, sender_id: i64, text: &str) -> bool;
}

#[derive(Debug)]
struct Account {
    name: String,
    privileges: u32,
    stored: PlayerStats,
    session: Option<Session>,
}

#[derive(Debug, Default)]
struct Session {
    stats: PlayerStats,
    outbox: Vec<Outbound>,
}

impl Account {
    fn restricted(&self) -> bool {
        self.privileges & UNRESTRICTED == 0
    }

    fn snapshot(&self, user_id: i64) -> PlayerSnapshot {
        PlayerSnapshot {
            user_id,
            name: self.name.clone(),
            restricted: self.restricted(),
            stats: self.session.as_ref().map(|s| s.stats).unwrap_or(self.stored),
        }
    }
}

#[derive(Debug, Default)]
pub struct LocalSessions {
    accounts: DashMap<i64, Account>,
    rooms: DashMap<String, BTreeSet<i64>>,
}

impl LocalSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, user_id: i64, name: &str, privileges: u32) {
        self.accounts.insert(
            user_id,
            Account {
                name: name.to_owned(),
                privileges,
                stored: PlayerStats::default(),
                session: None,
            },
        );
    }

    /// Records persisted stats; online sessions keep their copy until reloaded.
    pub fn store_stats(&self, user_id: i64, stats: PlayerStats) -> Result<(), DirectoryError> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DirectoryError::UnknownPlayer(user_id))?;
        account.stored = stats;
        Ok(())
    }

    pub fn login(&self, user_id: i64) -> Result<(), DirectoryError> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DirectoryError::UnknownPlayer(user_id))?;
        let stats = account.stored;
        account.session = Some(Session {
            stats,
            outbox: Vec::new(),
        });
        debug!("{} ({}) logged in", account.name, user_id);
        Ok(())
    }

    pub fn logout(&self, user_id: i64) {
        if let Some(mut account) = self.accounts.get_mut(&user_id) {
            account.session = None;
        }
        for mut members in self.rooms.iter_mut() {
            members.remove(&user_id);
        }
    }

    pub fn create_room(&self, room: &str) {
        self.rooms.entry(room.to_owned()).or_default();
    }

    pub fn join_room(&self, room: &str, user_id: i64) -> bool {
        match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.insert(user_id);
                true
            }
            None => false,
        }
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.accounts
            .get(&user_id)
            .is_some_and(|a| a.session.is_some())
    }

    pub fn online_count(&self) -> usize {
        self.accounts.iter().filter(|a| a.session.is_some()).count()
    }

    pub fn privileges(&self, user_id: i64) -> Option<u32> {
        self.accounts.get(&user_id).map(|a| a.privileges)
    }

    /// Takes everything queued for `user_id`.
    pub fn drain_outbox(&self, user_id: i64) -> Vec<Outbound> {
        self.accounts
            .get_mut(&user_id)
            .and_then(|mut a| a.session.as_mut().map(|s| std::mem::take(&mut s.outbox)))
            .unwrap_or_default()
    }

    fn enqueue(&self, user_id: i64, item: Outbound) -> Result<(), DirectoryError> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DirectoryError::NotOnline(user_id))?;
        let session = account
            .session
            .as_mut()
            .ok_or(DirectoryError::NotOnline(user_id))?;
        session.outbox.push(item);
        Ok(())
    }
}

#[async_trait]
impl PlayerDirectory for LocalSessions {
    async fn reload_stats(&self, user_id: i64) -> Result<PlayerSnapshot, DirectoryError> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DirectoryError::NotOnline(user_id))?;
        let stored = account.stored;
        let session = account
            .session
            .as_mut()
            .ok_or(DirectoryError::NotOnline(user_id))?;
        session.stats = stored;
        Ok(account.snapshot(user_id))
    }

    async fn broadcast_stats(&self, player: &PlayerSnapshot) -> usize {
        let mut recipients = 0;
        for mut account in self.accounts.iter_mut() {
            if let Some(session) = account.session.as_mut() {
                session.outbox.push(Outbound::UserStats(player.clone()));
                recipients += 1;
            }
        }
        recipients
    }

    async fn restrict(&self, user_id: i64, reason: &str) -> Result<(), DirectoryError> {
        let mut account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DirectoryError::UnknownPlayer(user_id))?;
        account.privileges &= !UNRESTRICTED;
        if let Some(session) = account.session.as_mut() {
            session.outbox.push(Outbound::Restricted {
                reason: reason.to_owned(),
            });
        }
        info!("Restricted {} ({}) for {:?}", account.name, user_id, reason);
        Ok(())
    }

    async fn notify(&self, user_id: i64, message: &str) -> Result<(), DirectoryError> {
        self.enqueue(
            user_id,
            Outbound::Notification {
                message: message.to_owned(),
            },
        )
    }

    async fn send_to_room(&self, room: &str, sender_id: i64, text: &str) -> bool {
        let members: Vec<i64> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return false,
        };
        let sender_name = self
            .accounts
            .get(&sender_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| sender_id.to_string());

        for member in members {
            let message = Outbound::RoomMessage {
                room: room.to_owned(),
                sender_id,
                sender_name: sender_name.clone(),
                text: text.to_owned(),
            };
            // Members who went offline since joining are skipped.
            let _ = self.enqueue(member, message);
        }
        true
    }
}
