//! Read-only listings: `--list-guilds` and `--list-channels`.
//!
//! Both render the scope-filtered view so the user can check exactly what
//! a sweep would touch before running one. Direct messages come first,
//! then guilds, each grouped by category, everything sorted by name.

use cordsweep_core::{ChannelTree, ScopeResolver};
use cordsweep_types::{Channel, ChannelId, ChannelKind, Guild};
use serde_json::json;

pub fn render_guilds(tree: &ChannelTree, json: bool) -> String {
    let mut guilds: Vec<&Guild> = tree.guilds.iter().collect();
    guilds.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    if json {
        let entries: Vec<_> = guilds
            .iter()
            .map(|g| json!({ "id": g.id, "name": g.name }))
            .collect();
        return serde_json::Value::Array(entries).to_string();
    }

    let mut out = String::new();
    out.push_str("Guilds:\n");
    if guilds.is_empty() {
        out.push_str("  (none)\n");
    }
    for guild in guilds {
        out.push_str(&format!("  {} (ID: {})\n", guild.name, guild.id));
    }
    out
}

pub fn render_channels(tree: &ChannelTree, resolver: &ScopeResolver, json: bool) -> String {
    let view = TreeView::build(tree, resolver);
    if json { view.to_json() } else { view.to_text() }
}

/// The scope-filtered tree, regrouped for presentation.
struct TreeView<'a> {
    dms: Vec<&'a Channel>,
    guilds: Vec<GuildView<'a>>,
}

struct GuildView<'a> {
    guild: &'a Guild,
    /// `None` holds channels outside any category.
    groups: Vec<(Option<&'a Channel>, Vec<&'a Channel>)>,
}

impl<'a> TreeView<'a> {
    fn build(tree: &'a ChannelTree, resolver: &ScopeResolver) -> Self {
        let category = |id: Option<ChannelId>| -> Option<&'a Channel> {
            let id = id?;
            tree.channels
                .iter()
                .find(|c| c.id == id && c.kind == ChannelKind::Category)
        };
        let by_name = |a: &&Channel, b: &&Channel| {
            a.display_name().cmp(&b.display_name()).then(a.id.cmp(&b.id))
        };

        let mut dms: Vec<&Channel> = tree
            .channels
            .iter()
            .filter(|c| c.guild_id.is_none() && resolver.is_selected(c))
            .collect();
        dms.sort_by(by_name);

        let mut guilds: Vec<GuildView<'a>> = Vec::new();
        let mut sorted_guilds: Vec<&Guild> = tree.guilds.iter().collect();
        sorted_guilds.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        for guild in sorted_guilds {
            let mut channels: Vec<&Channel> = tree
                .channels
                .iter()
                .filter(|c| c.guild_id == Some(guild.id) && resolver.is_selected(c))
                .collect();
            if channels.is_empty() {
                continue;
            }
            channels.sort_by(by_name);

            let mut groups: Vec<(Option<&Channel>, Vec<&Channel>)> = Vec::new();
            for channel in channels {
                let parent = category(channel.parent_id);
                match groups.iter_mut().find(|(p, _)| {
                    p.map(|c| c.id) == parent.map(|c| c.id)
                }) {
                    Some((_, members)) => members.push(channel),
                    None => groups.push((parent, vec![channel])),
                }
            }
            groups.sort_by(|(a, _), (b, _)| {
                // Uncategorized channels list first.
                match (a, b) {
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (Some(a), Some(b)) => by_name(a, b),
                }
            });
            guilds.push(GuildView { guild, groups });
        }

        Self { dms, guilds }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Direct Messages:\n");
        if self.dms.is_empty() {
            out.push_str("  (none)\n");
        }
        for dm in &self.dms {
            out.push_str(&format!("  {dm}\n"));
        }
        for view in &self.guilds {
            out.push_str(&format!(
                "Guild {} (ID: {}):\n",
                view.guild.name, view.guild.id
            ));
            for (parent, members) in &view.groups {
                match parent {
                    Some(category) => out.push_str(&format!("  {}:\n", category.display_name())),
                    None => out.push_str("  (no category):\n"),
                }
                for channel in members {
                    out.push_str(&format!("    {channel}\n"));
                }
            }
        }
        out
    }

    fn to_json(&self) -> String {
        let channel_json = |c: &Channel| {
            json!({
                "id": c.id,
                "kind": c.kind.label(),
                "name": c.display_name(),
            })
        };
        let guilds: Vec<_> = self
            .guilds
            .iter()
            .map(|view| {
                let groups: Vec<_> = view
                    .groups
                    .iter()
                    .map(|(parent, members)| {
                        json!({
                            "category": parent.map(|c| {
                                json!({ "id": c.id, "name": c.display_name() })
                            }),
                            "channels": members.iter().map(|c| channel_json(c)).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                json!({
                    "id": view.guild.id,
                    "name": view.guild.name,
                    "categories": groups,
                })
            })
            .collect();
        json!({
            "dms": self.dms.iter().map(|c| channel_json(c)).collect::<Vec<_>>(),
            "guilds": guilds,
        })
        .to_string()
    }
}
