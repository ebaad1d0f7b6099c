//! Core domain types for cordsweep.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies: snowflake ID newtypes, channel and message records as they
//! come off the Discord wire, and the duration grammar used by every
//! retention and sleep setting.

mod channel;
mod delta;
mod ids;
mod message;

pub use channel::{Channel, ChannelKind, Guild};
pub use delta::{DeltaError, DurationRange, parse_delta};
pub use ids::{ChannelId, GuildId, MessageId, ScopeId, UserId};
pub use message::{Emoji, MessageKind, MessageRecord, Reaction};
