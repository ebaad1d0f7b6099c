use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A guild (server) identifier.
    GuildId
);
snowflake_id!(
    /// A channel identifier. Categories are channels on the wire, so this
    /// also identifies a channel's parent category.
    ChannelId
);
snowflake_id!(
    /// A message identifier. Snowflakes increase with creation time, so the
    /// natural `Ord` doubles as a newest-first tie-break.
    MessageId
);
snowflake_id!(
    /// A user identifier.
    UserId
);
snowflake_id!(
    /// An include/exclude scope entry. May name a channel, a category, or a
    /// guild; which one is only known once the discovered tree is walked.
    ScopeId
);

impl From<ChannelId> for ScopeId {
    fn from(id: ChannelId) -> Self {
        Self(id.0)
    }
}

impl From<GuildId> for ScopeId {
    fn from(id: GuildId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_orders_like_snowflake() {
        assert!(MessageId::new(200) > MessageId::new(100));
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let id: ChannelId = "123456789012345678".parse().expect("parse");
        assert_eq!(id, ChannelId::new(123_456_789_012_345_678));
        assert_eq!(id.to_string(), "123456789012345678");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&MessageId::new(42)).expect("serialize");
        assert_eq!(json, "42");
    }
}
