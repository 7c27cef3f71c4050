//! # refx Server
//!
//! The coordination service. It receives `refresh_stats`, `announce`,
//! `restrict` and `notify` events published by other server processes and
//! applies them to the player directory. It also holds the ranking engine
//! and performance fan-out used by score submission.

pub mod app;
pub mod channels;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod sessions;
pub mod shutdown;

pub use app::{Application, Services};
pub use channels::{ChannelEvent, ChannelNames, ChannelParseError, EventPublisher, Topic};
pub use sessions::{DirectoryError, LocalSessions, Outbound, PlayerDirectory, PlayerSnapshot, PlayerStats};
