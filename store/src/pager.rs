//! Lazy newest-first pagination over one channel's messages.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use cordsweep_types::{ChannelId, DurationRange, MessageId, MessageRecord};
use tracing::{debug, warn};

use crate::{MessageStore, StoreError};

/// Messages fetched per page, the platform maximum.
pub const PAGE_SIZE: u8 = 100;

/// Bounds on how far back and how many messages a pager walks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchWindow {
    /// Stop once a message older than this instant appears. The cutoff is
    /// inclusive: a message stamped exactly at the cutoff is still yielded.
    pub cutoff: Option<DateTime<Utc>>,
    /// Stop after yielding this many messages.
    pub max_messages: Option<u64>,
}

/// A pull-based stream of one channel's messages, newest first.
///
/// Pages are fetched on demand and a sampled pause separates consecutive
/// page fetches so sustained walks stay under the rate limit. The stream
/// ends at the first short page, at the window cutoff, or at the message
/// cap, whichever comes first.
pub struct MessagePager<'a, S: MessageStore> {
    store: &'a S,
    channel: ChannelId,
    window: FetchWindow,
    fetch_sleep: DurationRange,
    buffer: VecDeque<MessageRecord>,
    cursor: Option<MessageId>,
    yielded: u64,
    fetched_once: bool,
    last_page_was_short: bool,
    done: bool,
}

impl<'a, S: MessageStore> MessagePager<'a, S> {
    pub fn new(
        store: &'a S,
        channel: ChannelId,
        window: FetchWindow,
        fetch_sleep: DurationRange,
    ) -> Self {
        Self {
            store,
            channel,
            window,
            fetch_sleep,
            buffer: VecDeque::new(),
            cursor: None,
            yielded: 0,
            fetched_once: false,
            last_page_was_short: false,
            done: false,
        }
    }

    /// Pull the next message, fetching another page if the buffer is dry.
    ///
    /// A channel that becomes unavailable after at least one page was
    /// served ends the stream instead of failing; unavailability on the
    /// very first page is the caller's to handle.
    pub async fn next(&mut self) -> Result<Option<MessageRecord>, StoreError> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(max) = self.window.max_messages
                && self.yielded >= max
            {
                debug!(channel = %self.channel, max, "Reached message cap");
                self.done = true;
                return Ok(None);
            }

            if let Some(message) = self.buffer.pop_front() {
                if let Some(cutoff) = self.window.cutoff
                    && message.timestamp < cutoff
                {
                    debug!(channel = %self.channel, "Reached age cutoff");
                    self.done = true;
                    return Ok(None);
                }
                self.yielded += 1;
                return Ok(Some(message));
            }

            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> Result<(), StoreError> {
        if self.last_page_was_short {
            // A short page means nothing older remains; skip the round trip.
            self.done = true;
            return Ok(());
        }

        if self.fetched_once && !self.fetch_sleep.is_zero() {
            tokio::time::sleep(self.fetch_sleep.sample()).await;
        }

        let page = match self
            .store
            .fetch_messages(self.channel, self.cursor, PAGE_SIZE)
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_unavailable() && self.fetched_once => {
                warn!(channel = %self.channel, error = %e, "Channel became unavailable mid-walk; ending stream");
                self.done = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.fetched_once = true;
        self.last_page_was_short = page.len() < usize::from(PAGE_SIZE);

        if page.is_empty() {
            self.done = true;
            return Ok(());
        }

        self.cursor = page.last().map(|m| m.id);
        self.buffer.extend(page);
        Ok(())
    }
}
