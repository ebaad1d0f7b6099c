//! The remote-platform boundary for cordsweep.
//!
//! # Architecture
//!
//! Everything that touches the network lives in this crate:
//!
//! - [`MessageStore`] - The operations the retention pipeline needs from the
//!   remote platform, expressed as a trait so the pipeline can be driven by
//!   an in-memory fake in tests.
//! - [`DiscordStore`] - The Discord REST v10 implementation.
//! - [`retry`] - The bounded retry loop wrapped around every outbound call:
//!   rate-limit responses sleep for the platform-reported wait plus a
//!   configurable buffer, transient failures retry up to a maximum attempt
//!   count.
//! - [`MessagePager`] - A lazy newest-first sequence of one channel's
//!   messages, honoring an age cutoff and a count cap.
//!
//! # Error Handling
//!
//! [`StoreError`] is the only error type that crosses this boundary. Raw
//! transport and HTTP errors are classified here; callers never inspect
//! status codes. `Unavailable` (403/404) marks resources to skip, `Auth`
//! is fatal, `Exhausted` means the retry budget ran out on a single call.

mod discord;
mod pager;
pub mod retry;

use cordsweep_types::{Channel, ChannelId, Emoji, Guild, GuildId, MessageId, MessageRecord, UserId};
use thiserror::Error;

pub use discord::{DISCORD_API_BASE_URL, DiscordStore};
pub use pager::{FetchWindow, MessagePager, PAGE_SIZE};
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The token was rejected (401). Never retried.
    #[error("unauthorized while attempting to {what}")]
    Auth { what: String },

    /// The resource is gone or forbidden (403/404). Never retried; callers
    /// skip the item.
    #[error("resource unavailable ({status}) while attempting to {what}")]
    Unavailable { status: u16, what: String },

    /// Rate-limit and transient retries were exhausted.
    #[error("retries exhausted while attempting to {what}")]
    Exhausted { what: String },

    /// A status outside the handled set.
    #[error("unexpected status {status} while attempting to {what}")]
    Unexpected { status: u16, what: String },

    /// The response body did not match the expected shape.
    #[error("malformed response while attempting to {what}: {detail}")]
    Malformed { what: String, detail: String },
}

impl StoreError {
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// The operations the retention pipeline needs from the remote platform.
///
/// All listings and fetches are snapshots; nothing is cached between calls.
/// `fetch_messages` pages are newest-first in strictly decreasing message-id
/// order, which the pager and the preserve policy both rely on.
#[allow(async_fn_in_trait)]
pub trait MessageStore {
    async fn list_guilds(&self) -> Result<Vec<Guild>, StoreError>;

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<Channel>, StoreError>;

    async fn list_dm_channels(&self) -> Result<Vec<Channel>, StoreError>;

    async fn fetch_messages(
        &self,
        channel: ChannelId,
        before: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Fetch one message directly, bypassing pagination. `None` when the
    /// message no longer exists.
    async fn fetch_message_by_id(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), StoreError>;

    async fn delete_own_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &Emoji,
    ) -> Result<(), StoreError>;

    async fn resolve_current_user_id(&self) -> Result<UserId, StoreError>;
}
