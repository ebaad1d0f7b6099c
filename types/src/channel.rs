use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId, ScopeId};

/// Discord channel types, narrowed to what a retention run cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Text,
    Dm,
    GroupDm,
    Category,
    Unknown(u8),
}

impl ChannelKind {
    #[must_use]
    pub const fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Text,
            1 => Self::Dm,
            3 => Self::GroupDm,
            4 => Self::Category,
            other => Self::Unknown(other),
        }
    }

    /// Whether messages in this channel are fetched and classified.
    /// Categories only contribute ancestry; unknown kinds are skipped.
    #[must_use]
    pub const fn is_processable(self) -> bool {
        matches!(self, Self::Text | Self::Dm | Self::GroupDm)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "GuildText",
            Self::Dm => "DM",
            Self::GroupDm => "GroupDM",
            Self::Category => "Category",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// A guild (server) as discovered from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

/// A discovered channel. Immutable once discovered; one fetch per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    /// Guild channels have a name; DMs usually only have recipients.
    pub name: Option<String>,
    pub parent_id: Option<ChannelId>,
    pub guild_id: Option<GuildId>,
    /// Recipient usernames, for naming DM and group-DM channels.
    pub recipients: Vec<String>,
}

impl Channel {
    /// The ancestor chain used for scope resolution: the channel itself,
    /// its parent category if any, and its guild if any.
    pub fn ancestors(&self) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::once(ScopeId::from(self.id))
            .chain(self.parent_id.map(ScopeId::from))
            .chain(self.guild_id.map(ScopeId::from))
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if self.recipients.is_empty() {
            return self.id.to_string();
        }
        self.recipients.join(", ")
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (ID: {})",
            self.kind.label(),
            self.display_name(),
            self.id
        )
    }
}
