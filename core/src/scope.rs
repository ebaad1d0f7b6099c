//! Include/exclude scope resolution over the discovered channel tree.
//!
//! Both lists may name a channel, its parent category, or its guild. An
//! include anywhere in a channel's ancestor chain overrides an exclude at
//! any other level (includes punch through), and an ID in both lists
//! resolves to included.

use std::collections::HashSet;

use cordsweep_types::{Channel, ScopeId};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ScopeResolver {
    include: HashSet<ScopeId>,
    exclude: HashSet<ScopeId>,
}

impl ScopeResolver {
    pub fn new(
        include: impl IntoIterator<Item = ScopeId>,
        exclude: impl IntoIterator<Item = ScopeId>,
    ) -> Self {
        Self {
            include: include.into_iter().collect(),
            exclude: exclude.into_iter().collect(),
        }
    }

    /// Whether an include list was given at all. With none, everything
    /// eligible is in scope by default.
    #[must_use]
    pub fn has_includes(&self) -> bool {
        !self.include.is_empty()
    }

    /// The scope verdict for one channel. Categories and other
    /// non-message channels are never selected; they contribute ancestry
    /// only.
    #[must_use]
    pub fn is_selected(&self, channel: &Channel) -> bool {
        if !channel.kind.is_processable() {
            return false;
        }
        let ancestors: Vec<ScopeId> = channel.ancestors().collect();
        let any_included = ancestors.iter().any(|a| self.include.contains(a));
        let any_excluded = ancestors.iter().any(|a| self.exclude.contains(a));

        let included = self.include.is_empty() || any_included;
        let excluded = any_excluded && !any_included;
        included && !excluded
    }

    /// Filter the discovered channels down to the processable in-scope
    /// set, sorted by ID so the result is independent of discovery order.
    #[must_use]
    pub fn resolve(&self, channels: &[Channel]) -> Vec<Channel> {
        let mut selected: Vec<Channel> = channels
            .iter()
            .filter(|c| self.is_selected(c))
            .cloned()
            .collect();
        selected.sort_by_key(|c| c.id);
        debug!(
            discovered = channels.len(),
            selected = selected.len(),
            "Resolved channel scope"
        );
        selected
    }
}
