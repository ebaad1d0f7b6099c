//! The per-channel deletion pipeline.
//!
//! For each in-scope channel: fetch newest-first, splice in cached
//! preserved IDs, classify each message, act on the verdict, persist the
//! new preserved set. Channels are processed one at a time; a fetch
//! failure skips the channel, a delete failure skips the message, and the
//! cache records what classification decided regardless of whether the
//! deletes landed.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use cordsweep_store::{FetchWindow, MessagePager, MessageStore, StoreError};
use cordsweep_types::{Channel, ChannelId, DurationRange, Guild, MessageId, MessageRecord};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{ChannelEntry, PreserveCache};
use crate::policy::{PolicyEvaluator, RetentionPolicy, Verdict};

/// A run-fatal failure. Everything else degrades to a skipped channel or
/// message.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("authentication rejected mid-run: {source}")]
    Auth {
        #[source]
        source: StoreError,
    },
}

/// Cooperative cancellation handle, shared with the signal handler.
///
/// Checked between channels and between messages; a cancelled run keeps
/// whatever cache state completed channels already persisted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything discovery returns: the guilds and every channel seen,
/// categories included (they carry ancestry for scope resolution).
#[derive(Debug, Default)]
pub struct ChannelTree {
    pub guilds: Vec<Guild>,
    pub channels: Vec<Channel>,
}

/// Walk the account's DM channels and every guild's channel list.
///
/// Any failure here is fatal to the run; there is nothing sensible to
/// sweep without the full tree.
pub async fn discover<S: MessageStore>(store: &S) -> Result<ChannelTree, StoreError> {
    let mut channels = store.list_dm_channels().await?;
    let guilds = store.list_guilds().await?;
    for guild in &guilds {
        channels.extend(store.list_channels(guild.id).await?);
    }
    info!(
        guilds = guilds.len(),
        channels = channels.len(),
        "Discovered channel tree"
    );
    Ok(ChannelTree { guilds, channels })
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    /// Classify and log without issuing any mutating call.
    pub dry_run: bool,
    pub fetch_window: FetchWindow,
    /// Pause between page fetches.
    pub fetch_sleep: DurationRange,
    /// Pause after each successful delete.
    pub delete_sleep: DurationRange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Channels fully processed.
    pub channels: u64,
    /// Messages classified.
    pub processed: u64,
    /// Own messages preserved by count or recency.
    pub preserved: u64,
    /// Own messages deleted, or would-delete under dry-run.
    pub deleted: u64,
    /// Own reactions removed from other messages.
    pub reactions_removed: u64,
    /// Own reactions left in place inside the preserve window.
    pub reactions_preserved: u64,
    /// Deletes and reaction removals that failed.
    pub failed: u64,
}

enum ChannelOutcome {
    Completed(ChannelEntry),
    /// Fetch failed; the channel's previous cache entry stands.
    Skipped,
    /// Cancelled mid-channel; the previous cache entry stands.
    Interrupted,
}

pub struct Sweeper<'a, S: MessageStore> {
    store: &'a S,
    policy: RetentionPolicy,
    options: SweepOptions,
    cache: Option<PreserveCache>,
}

impl<'a, S: MessageStore> Sweeper<'a, S> {
    pub fn new(
        store: &'a S,
        policy: RetentionPolicy,
        options: SweepOptions,
        cache: Option<PreserveCache>,
    ) -> Self {
        Self {
            store,
            policy,
            options,
            cache,
        }
    }

    /// Process the resolved channels in order. Returns the summary so far
    /// on cancellation; only an authentication rejection is fatal.
    pub async fn run(
        &mut self,
        channels: &[Channel],
        cancel: &CancelFlag,
    ) -> Result<RunSummary, SweepError> {
        let mut summary = RunSummary::default();
        for channel in channels {
            if cancel.is_cancelled() {
                info!("Cancellation requested; stopping before next channel");
                break;
            }
            info!(channel = %channel, "Processing channel");
            match self.process_channel(channel.id, cancel, &mut summary).await? {
                ChannelOutcome::Completed(entry) => {
                    summary.channels += 1;
                    self.persist(channel.id, entry);
                }
                ChannelOutcome::Skipped => {}
                ChannelOutcome::Interrupted => break,
            }
        }
        Ok(summary)
    }

    async fn process_channel(
        &mut self,
        channel: ChannelId,
        cancel: &CancelFlag,
        summary: &mut RunSummary,
    ) -> Result<ChannelOutcome, SweepError> {
        let cached_ids = self
            .cache
            .as_ref()
            .and_then(|c| c.entry(channel))
            .map(cached_ids_descending)
            .unwrap_or_default();

        let pager = MessagePager::new(
            self.store,
            channel,
            self.options.fetch_window,
            self.options.fetch_sleep,
        );
        let mut stream = MergedStream::new(self.store, channel, pager, cached_ids);
        let mut evaluator = PolicyEvaluator::new(&self.policy, Utc::now());
        let mut entry = ChannelEntry::default();

        loop {
            if cancel.is_cancelled() {
                info!(%channel, "Cancellation requested; abandoning channel");
                return Ok(ChannelOutcome::Interrupted);
            }
            let message = match stream.next().await {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(source @ StoreError::Auth { .. }) => return Err(SweepError::Auth { source }),
                Err(e) => {
                    warn!(%channel, error = %e, "Fetch failed; skipping rest of channel");
                    return Ok(ChannelOutcome::Skipped);
                }
            };
            summary.processed += 1;
            self.apply(&message, evaluator.classify(&message), &mut entry, summary)
                .await?;
        }

        debug!(
            %channel,
            preserved = entry.messages.len(),
            kept_count = evaluator.kept_count(),
            "Channel classified"
        );
        Ok(ChannelOutcome::Completed(entry))
    }

    async fn apply(
        &self,
        message: &MessageRecord,
        verdict: Verdict,
        entry: &mut ChannelEntry,
        summary: &mut RunSummary,
    ) -> Result<(), SweepError> {
        match verdict {
            Verdict::Preserve(reason) => {
                debug!(message = %message.id, ?reason, "Preserving message");
                summary.preserved += 1;
                entry.messages.push(message.id);
                if self.policy.delete_reactions {
                    let own = message.own_reactions().count() as u64;
                    if own > 0 {
                        summary.reactions_preserved += own;
                        entry.reacted.push(message.id);
                    }
                }
            }
            Verdict::Delete => {
                if self.options.dry_run {
                    info!(message = %message.id, "Would delete message (dry run)");
                    summary.deleted += 1;
                    return Ok(());
                }
                match self
                    .store
                    .delete_message(message.channel_id, message.id)
                    .await
                {
                    Ok(()) => {
                        info!(message = %message.id, "Deleted message");
                        summary.deleted += 1;
                        self.pause().await;
                    }
                    Err(source @ StoreError::Auth { .. }) => {
                        return Err(SweepError::Auth { source });
                    }
                    Err(e) => {
                        warn!(message = %message.id, error = %e, "Delete failed; continuing");
                        summary.failed += 1;
                    }
                }
            }
            Verdict::PreserveReactions => {
                summary.reactions_preserved += message.own_reactions().count() as u64;
                entry.reacted.push(message.id);
            }
            Verdict::StripReactions => {
                for reaction in message.own_reactions() {
                    if self.options.dry_run {
                        info!(message = %message.id, "Would remove reaction (dry run)");
                        summary.reactions_removed += 1;
                        continue;
                    }
                    match self
                        .store
                        .delete_own_reaction(message.channel_id, message.id, &reaction.emoji)
                        .await
                    {
                        Ok(()) => {
                            info!(message = %message.id, "Removed reaction");
                            summary.reactions_removed += 1;
                            self.pause().await;
                        }
                        Err(source @ StoreError::Auth { .. }) => {
                            return Err(SweepError::Auth { source });
                        }
                        Err(e) => {
                            warn!(message = %message.id, error = %e, "Reaction removal failed; continuing");
                            summary.failed += 1;
                        }
                    }
                }
            }
            Verdict::Ignore => {}
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.options.delete_sleep.is_zero() {
            tokio::time::sleep(self.options.delete_sleep.sample()).await;
        }
    }

    fn persist(&mut self, channel: ChannelId, entry: ChannelEntry) {
        let Some(cache) = &mut self.cache else {
            return;
        };
        cache.set_entry(channel, entry);
        // Saved per channel so a later cancellation loses nothing.
        if let Err(e) = cache.save() {
            warn!(%channel, error = %e, "Could not persist preserve cache");
        }
    }
}

/// The union of a cache entry's ID lists, newest first.
fn cached_ids_descending(entry: &ChannelEntry) -> VecDeque<MessageId> {
    let mut ids: Vec<MessageId> = entry
        .messages
        .iter()
        .chain(entry.reacted.iter())
        .copied()
        .collect();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
    ids.into()
}

/// The live pager stream with previously-preserved IDs spliced back in at
/// their chronological position.
///
/// Cached IDs bypass the fetch window: a preserved message older than the
/// cutoff is still re-fetched and re-judged. IDs that no longer resolve
/// are dropped silently.
struct MergedStream<'a, S: MessageStore> {
    store: &'a S,
    channel: ChannelId,
    pager: MessagePager<'a, S>,
    cached: VecDeque<MessageId>,
    peeked: Option<MessageRecord>,
    pager_done: bool,
    seen: HashSet<MessageId>,
}

impl<'a, S: MessageStore> MergedStream<'a, S> {
    fn new(
        store: &'a S,
        channel: ChannelId,
        pager: MessagePager<'a, S>,
        cached: VecDeque<MessageId>,
    ) -> Self {
        Self {
            store,
            channel,
            pager,
            cached,
            peeked: None,
            pager_done: false,
            seen: HashSet::new(),
        }
    }

    async fn next(&mut self) -> Result<Option<MessageRecord>, StoreError> {
        loop {
            if self.peeked.is_none() && !self.pager_done {
                self.peeked = self.pager.next().await?;
                self.pager_done = self.peeked.is_none();
            }

            let cached_newer = match (self.cached.front(), &self.peeked) {
                (None, None) => return Ok(None),
                (None, Some(_)) => false,
                (Some(_), None) => true,
                (Some(id), Some(live)) => *id >= live.id,
            };

            if !cached_newer {
                let live = self.peeked.take();
                if let Some(live) = &live {
                    self.seen.insert(live.id);
                }
                return Ok(live);
            }

            let Some(id) = self.cached.pop_front() else {
                continue;
            };
            if self.seen.contains(&id) {
                continue;
            }
            if let Some(live) = &self.peeked
                && live.id == id
            {
                // The live stream already carries this one.
                continue;
            }
            match self.store.fetch_message_by_id(self.channel, id).await {
                Ok(Some(message)) => {
                    self.seen.insert(id);
                    debug!(%id, "Re-injected cached message");
                    return Ok(Some(message));
                }
                Ok(None) => {
                    debug!(%id, "Cached message no longer exists; dropping");
                }
                Err(e) if e.is_unavailable() => {
                    debug!(%id, error = %e, "Cached message unavailable; dropping");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
