//! Channel names and payload codecs for the coordination events.
//!
//! | topic           | payload              |
//! |-----------------|----------------------|
//! | `refresh_stats` | `<user id>`          |
//! | `announce`      | `<score id>`         |
//! | `restrict`      | `<user id>\|<reason>`  |
//! | `notify`        | `<user id>\|<message>` |
//!
//! Pair payloads split on the first `|`, so the text part may itself contain
//! `|`.

use refx_event_bus::{HandlerError, Publish, TransportError};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    RefreshStats,
    Announce,
    Restrict,
    Notify,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::RefreshStats,
        Topic::Announce,
        Topic::Restrict,
        Topic::Notify,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Self::RefreshStats => "refresh_stats",
            Self::Announce => "announce",
            Self::Restrict => "restrict",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Builds full channel names from a deployment-wide prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    prefix: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::new("refx:")
    }
}

impl ChannelNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self, topic: Topic) -> String {
        format!("{}{}", self.prefix, topic.suffix())
    }

    pub fn topic_of(&self, channel: &str) -> Option<Topic> {
        let suffix = channel.strip_prefix(self.prefix.as_str())?;
        Topic::ALL.into_iter().find(|t| t.suffix() == suffix)
    }

    pub fn all(&self) -> Vec<String> {
        Topic::ALL.iter().map(|&t| self.name(t)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelParseError {
    #[error("expected a numeric id, got {0:?}")]
    InvalidId(String),
    #[error("expected \"<id>|<text>\", got {0:?}")]
    MissingSeparator(String),
}

impl From<ChannelParseError> for HandlerError {
    fn from(error: ChannelParseError) -> Self {
        HandlerError::InvalidPayload(error.to_string())
    }
}

pub fn parse_id(payload: &str) -> Result<i64, ChannelParseError> {
    payload
        .trim()
        .parse()
        .map_err(|_| ChannelParseError::InvalidId(payload.to_owned()))
}

pub fn parse_pair(payload: &str) -> Result<(i64, &str), ChannelParseError> {
    let (id, text) = payload
        .split_once('|')
        .ok_or_else(|| ChannelParseError::MissingSeparator(payload.to_owned()))?;
    Ok((parse_id(id)?, text))
}

/// A coordination event in typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    RefreshStats { user_id: i64 },
    Announce { score_id: i64 },
    Restrict { user_id: i64, reason: String },
    Notify { user_id: i64, message: String },
}

impl ChannelEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::RefreshStats { .. } => Topic::RefreshStats,
            Self::Announce { .. } => Topic::Announce,
            Self::Restrict { .. } => Topic::Restrict,
            Self::Notify { .. } => Topic::Notify,
        }
    }

    pub fn parse(topic: Topic, payload: &str) -> Result<Self, ChannelParseError> {
        Ok(match topic {
            Topic::RefreshStats => Self::RefreshStats {
                user_id: parse_id(payload)?,
            },
            Topic::Announce => Self::Announce {
                score_id: parse_id(payload)?,
            },
            Topic::Restrict => {
                let (user_id, reason) = parse_pair(payload)?;
                Self::Restrict {
                    user_id,
                    reason: reason.to_owned(),
                }
            }
            Topic::Notify => {
                let (user_id, message) = parse_pair(payload)?;
                Self::Notify {
                    user_id,
                    message: message.to_owned(),
                }
            }
        })
    }

    pub fn encode_payload(&self) -> String {
        match self {
            Self::RefreshStats { user_id } => user_id.to_string(),
            Self::Announce { score_id } => score_id.to_string(),
            Self::Restrict { user_id, reason } => format!("{user_id}|{reason}"),
            Self::Notify { user_id, message } => format!("{user_id}|{message}"),
        }
    }
}

/// Publishes [`ChannelEvent`]s on their channels.
#[derive(Debug, Clone)]
pub struct EventPublisher<P> {
    publisher: P,
    names: ChannelNames,
}

impl<P: Publish> EventPublisher<P> {
    pub fn new(publisher: P, names: ChannelNames) -> Self {
        Self { publisher, names }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub async fn publish(&self, event: &ChannelEvent) -> Result<(), TransportError> {
        let channel = self.names.name(event.topic());
        let payload = event.encode_payload();
        debug!("Publishing on {}: {}", channel, payload);
        self.publisher.publish(&channel, payload.as_bytes()).await
    }

    pub async fn refresh_stats(&self, user_id: i64) -> Result<(), TransportError> {
        self.publish(&ChannelEvent::RefreshStats { user_id }).await
    }

    pub async fn announce(&self, score_id: i64) -> Result<(), TransportError> {
        self.publish(&ChannelEvent::Announce { score_id }).await
    }

    pub async fn restrict(&self, user_id: i64, reason: &str) -> Result<(), TransportError> {
        self.publish(&ChannelEvent::Restrict {
            user_id,
            reason: reason.to_owned(),
        })
        .await
    }

    pub async fn notify(&self, user_id: i64, message: &str) -> Result<(), TransportError> {
        self.publish(&ChannelEvent::Notify {
            user_id,
            message: message.to_owned(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refx_event_bus::{local_bus, MessageSource};
    use std::time::Duration;

    #[test]
    fn test_channel_names() {
        let names = ChannelNames::default();
        assert_eq!(names.name(Topic::RefreshStats), "refx:refresh_stats");
        assert_eq!(names.topic_of("refx:notify"), Some(Topic::Notify));
        assert_eq!(names.topic_of("other:notify"), None);
        assert_eq!(names.topic_of("refx:unknown"), None);
        assert_eq!(names.all().len(), 4);
    }

    #[test]
    fn test_parse_each_topic() {
        assert_eq!(
            ChannelEvent::parse(Topic::RefreshStats, "1000"),
            Ok(ChannelEvent::RefreshStats { user_id: 1000 })
        );
        assert_eq!(
            ChannelEvent::parse(Topic::Announce, "73 "),
            Ok(ChannelEvent::Announce { score_id: 73 })
        );
        assert_eq!(
            ChannelEvent::parse(Topic::Restrict, "1000|multiaccounting"),
            Ok(ChannelEvent::Restrict {
                user_id: 1000,
                reason: "multiaccounting".to_string()
            })
        );
        assert_eq!(
            ChannelEvent::parse(Topic::Notify, "1000|a|b"),
            Ok(ChannelEvent::Notify {
                user_id: 1000,
                message: "a|b".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            ChannelEvent::parse(Topic::Announce, "abc"),
            Err(ChannelParseError::InvalidId(_))
        ));
        assert!(matches!(
            ChannelEvent::parse(Topic::Notify, "1000"),
            Err(ChannelParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            ChannelEvent::parse(Topic::Restrict, "x|reason"),
            Err(ChannelParseError::InvalidId(_))
        ));
    }

    #[test]
    fn test_parse_error_is_invalid_payload() {
        let error: HandlerError = ChannelParseError::InvalidId("x".to_string()).into();
        assert!(matches!(error, HandlerError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn test_publisher_uses_prefixed_channel() {
        let (publisher, mut source) = local_bus();
        let events = EventPublisher::new(publisher, ChannelNames::new("test:"));
        events.notify(7, "hello").await.unwrap();

        let message = source
            .recv(Duration::from_millis(50))
            .await
            .unwrap()
            .expect("message published");
        assert_eq!(message.channel, "test:notify");
        assert_eq!(message.payload, b"7|hello");
    }
}
