use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, MessageId, UserId};

/// Discord message types, split into user-deletable content and system
/// messages the tool must never delete (it may still strip reactions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Default,
    Reply,
    ChatInputCommand,
    ContextMenuCommand,
    System(u8),
}

impl MessageKind {
    #[must_use]
    pub const fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Default,
            19 => Self::Reply,
            20 => Self::ChatInputCommand,
            23 => Self::ContextMenuCommand,
            other => Self::System(other),
        }
    }

    #[must_use]
    pub const fn deletable(self) -> bool {
        !matches!(self, Self::System(_))
    }
}

/// An emoji attached to a reaction. Custom emoji carry an id; standard
/// Unicode emoji only a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    pub name: Option<String>,
    pub id: Option<u64>,
}

impl Emoji {
    /// The identifier the reaction-removal endpoint expects:
    /// `name:id` for custom emoji, the bare name otherwise.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        match self.id {
            Some(id) => Some(format!("{name}:{id}")),
            None => Some(name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: Emoji,
    /// True when the current user is among the reactors.
    pub me: bool,
}

/// A message as fetched from the store. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub reactions: Vec<Reaction>,
}

impl MessageRecord {
    /// Whether this run may delete the message: authored by the current
    /// user and of a deletable kind.
    #[must_use]
    pub fn is_deletable_by(&self, user: UserId) -> bool {
        self.author_id == user && self.kind.deletable()
    }

    /// Reactions placed by the current user.
    pub fn own_reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.iter().filter(|r| r.me)
    }
}
