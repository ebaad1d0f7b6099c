//! Discord REST v10 implementation of [`MessageStore`].
//!
//! Snowflakes arrive as strings on the wire; timestamps as RFC 3339.
//! Malformed reactions are tolerated (logged and skipped) so one odd
//! payload cannot abort a long run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use cordsweep_types::{
    Channel, ChannelId, ChannelKind, Emoji, Guild, GuildId, MessageId, MessageKind, MessageRecord,
    Reaction, UserId,
};

use crate::retry::{RetryPolicy, send_with_retry};
use crate::{MessageStore, StoreError};

pub const DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";

const CONNECT_TIMEOUT_SECS: u64 = 30;

pub struct DiscordStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
    policy: RetryPolicy,
}

impl DiscordStore {
    pub fn new(token: impl Into<String>, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Self::with_base_url(token, policy, DISCORD_API_BASE_URL)
    }

    /// Point the store at an alternative base URL. Tests aim this at a mock
    /// server.
    pub fn with_base_url(
        token: impl Into<String>,
        policy: RetryPolicy,
        base_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            policy,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, StoreError> {
        let response = send_with_retry(
            || {
                self.client
                    .get(&url)
                    .header(reqwest::header::AUTHORIZATION, &self.token)
                    .query(query)
            },
            what,
            &self.policy,
        )
        .await?;

        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Malformed {
                what: what.to_string(),
                detail: e.to_string(),
            })
    }

    async fn delete(&self, url: String, what: &str) -> Result<(), StoreError> {
        send_with_retry(
            || {
                self.client
                    .delete(&url)
                    .header(reqwest::header::AUTHORIZATION, &self.token)
            },
            what,
            &self.policy,
        )
        .await
        .map(drop)
    }
}

impl MessageStore for DiscordStore {
    async fn list_guilds(&self) -> Result<Vec<Guild>, StoreError> {
        let url = format!("{}/users/@me/guilds", self.base_url);
        let wire: Vec<WireGuild> = self.get_json(url, &[], "fetch guilds").await?;
        wire.into_iter().map(WireGuild::into_guild).collect()
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, StoreError> {
        let url = format!("{}/guilds/{guild}/channels", self.base_url);
        let what = format!("fetch channels for guild {guild}");
        let wire: Vec<WireChannel> = self.get_json(url, &[], &what).await?;
        wire.into_iter()
            .map(|c| c.into_channel(Some(guild)))
            .collect()
    }

    async fn list_dm_channels(&self) -> Result<Vec<Channel>, StoreError> {
        let url = format!("{}/users/@me/channels", self.base_url);
        let wire: Vec<WireChannel> = self.get_json(url, &[], "fetch DM channels").await?;
        wire.into_iter().map(|c| c.into_channel(None)).collect()
    }

    async fn fetch_messages(
        &self,
        channel: ChannelId,
        before: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let url = format!("{}/channels/{channel}/messages", self.base_url);
        let what = format!("fetch messages in channel {channel}");
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        let wire: Vec<WireMessage> = self.get_json(url, &query, &what).await?;
        wire.into_iter().map(|m| m.into_record(channel)).collect()
    }

    async fn fetch_message_by_id(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let url = format!("{}/channels/{channel}/messages", self.base_url);
        let what = format!("fetch message {message} in channel {channel}");
        let query = vec![("around", message.to_string()), ("limit", "1".to_string())];
        let wire: Vec<WireMessage> = self.get_json(url, &query, &what).await?;

        // `around` returns the nearest message; only an exact hit counts.
        match wire.into_iter().next() {
            Some(m) if m.id == message.to_string() => m.into_record(channel).map(Some),
            _ => {
                debug!(%message, %channel, "Message not found");
                Ok(None)
            }
        }
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        let url = format!("{}/channels/{channel}/messages/{message}", self.base_url);
        let what = format!("delete message {message} in channel {channel}");
        self.delete(url, &what).await
    }

    async fn delete_own_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
    ) -> Result<(), StoreError> {
        let what = format!("delete reaction on message {message} in channel {channel}");
        let Some(identifier) = emoji.identifier() else {
            warn!(%message, %channel, "Skipping reaction with no emoji identifier");
            return Ok(());
        };
        let url = format!(
            "{}/channels/{channel}/messages/{message}/reactions/{}/@me",
            self.base_url,
            urlencoding::encode(&identifier)
        );
        self.delete(url, &what).await
    }

    async fn resolve_current_user_id(&self) -> Result<UserId, StoreError> {
        let url = format!("{}/users/@me", self.base_url);
        let what = "fetch current user";
        let wire: WireUser = self.get_json(url, &[], what).await?;
        parse_id(&wire.id, what).map(UserId::new)
    }
}

fn parse_id(raw: &str, what: &str) -> Result<u64, StoreError> {
    raw.parse::<u64>().map_err(|_| StoreError::Malformed {
        what: what.to_string(),
        detail: format!("bad snowflake `{raw}`"),
    })
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Malformed {
            what: what.to_string(),
            detail: format!("bad timestamp `{raw}`"),
        })
}

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: String,
    name: Option<String>,
}

impl WireGuild {
    fn into_guild(self) -> Result<Guild, StoreError> {
        Ok(Guild {
            id: GuildId::new(parse_id(&self.id, "parse guild")?),
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
    parent_id: Option<String>,
    guild_id: Option<String>,
    #[serde(default)]
    recipients: Vec<WireUser>,
}

impl WireChannel {
    fn into_channel(self, guild: Option<GuildId>) -> Result<Channel, StoreError> {
        let what = "parse channel";
        let guild_id = match (&self.guild_id, guild) {
            (Some(raw), _) => Some(GuildId::new(parse_id(raw, what)?)),
            (None, fallback) => fallback,
        };
        let parent_id = self
            .parent_id
            .as_deref()
            .map(|raw| parse_id(raw, what).map(ChannelId::new))
            .transpose()?;
        Ok(Channel {
            id: ChannelId::new(parse_id(&self.id, what)?),
            kind: ChannelKind::from_wire(self.kind),
            name: self.name,
            parent_id,
            guild_id,
            recipients: self
                .recipients
                .into_iter()
                .map(|r| r.username.unwrap_or_else(|| "Unknown".to_string()))
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireEmoji {
    name: Option<String>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    emoji: WireEmoji,
    #[serde(default)]
    me: bool,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(rename = "type", default)]
    kind: u8,
    timestamp: String,
    author: Option<WireUser>,
    #[serde(default)]
    reactions: Vec<WireReaction>,
}

impl WireMessage {
    fn into_record(self, channel: ChannelId) -> Result<MessageRecord, StoreError> {
        let what = "parse message";
        let author = self.author.ok_or_else(|| StoreError::Malformed {
            what: what.to_string(),
            detail: format!("message {} has no author", self.id),
        })?;
        let reactions = self
            .reactions
            .into_iter()
            .filter_map(|r| {
                let id = match r.emoji.id.as_deref() {
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(id) => Some(id),
                        Err(_) => {
                            warn!(emoji = ?r.emoji.name, "Skipping reaction with bad emoji id");
                            return None;
                        }
                    },
                    None => None,
                };
                Some(Reaction {
                    emoji: Emoji {
                        name: r.emoji.name,
                        id,
                    },
                    me: r.me,
                })
            })
            .collect();
        Ok(MessageRecord {
            id: MessageId::new(parse_id(&self.id, what)?),
            channel_id: channel,
            author_id: UserId::new(parse_id(&author.id, what)?),
            timestamp: parse_timestamp(&self.timestamp, what)?,
            kind: MessageKind::from_wire(self.kind),
            reactions,
        })
    }
}
