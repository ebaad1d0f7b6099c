//! Message classification against the count and age thresholds.
//!
//! Pure logic: the evaluator sees a newest-first stream and hands back a
//! verdict per message. All I/O consequences (deleting, cache recording)
//! belong to the sweep pipeline.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cordsweep_types::{MessageRecord, UserId};

/// What counts toward the `preserve_n` budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// Only the current user's own deletable messages consume budget.
    #[default]
    Mine,
    /// Every observed message consumes budget, regardless of author.
    All,
}

/// The retention thresholds for one run.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Newest-N count threshold. Zero disables count preservation.
    pub preserve_n: u32,
    pub count_mode: CountMode,
    /// Age threshold: messages strictly younger than this are preserved
    /// without consuming the count budget. Zero disables it.
    pub preserve_last: Duration,
    /// Whether the run removes the user's own reactions from messages it
    /// cannot delete.
    pub delete_reactions: bool,
    pub current_user: UserId,
}

impl RetentionPolicy {
    /// Both thresholds zero: every deletable message is a wipe candidate.
    #[must_use]
    pub fn preserves_nothing(&self) -> bool {
        self.preserve_n == 0 && self.preserve_last.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreserveReason {
    /// Within the newest-N count budget.
    Count,
    /// Younger than the age threshold.
    Recency,
}

/// The classification outcome for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The user's own message, kept. Recorded in the preserve cache.
    Preserve(PreserveReason),
    /// The user's own message, outside both thresholds.
    Delete,
    /// Not the user's to delete, but inside the preserve window and
    /// carrying the user's reactions, which stay.
    PreserveReactions,
    /// Not the user's to delete and outside the window; the user's
    /// reactions on it go.
    StripReactions,
    /// Nothing about this message concerns the run.
    Ignore,
}

/// One channel's pass over the newest-first stream.
///
/// Holds the `kept_count` budget consumed so far; build a fresh evaluator
/// per channel. `now` is injected so tests are deterministic.
pub struct PolicyEvaluator<'a> {
    policy: &'a RetentionPolicy,
    now: DateTime<Utc>,
    kept: u32,
}

impl<'a> PolicyEvaluator<'a> {
    #[must_use]
    pub fn new(policy: &'a RetentionPolicy, now: DateTime<Utc>) -> Self {
        Self {
            policy,
            now,
            kept: 0,
        }
    }

    /// Messages that have consumed the count budget so far.
    #[must_use]
    pub const fn kept_count(&self) -> u32 {
        self.kept
    }

    pub fn classify(&mut self, message: &MessageRecord) -> Verdict {
        let own = message.is_deletable_by(self.policy.current_user);

        let counts = match self.policy.count_mode {
            CountMode::All => true,
            CountMode::Mine => own,
        };
        let in_count = counts && self.kept < self.policy.preserve_n;
        if in_count {
            self.kept += 1;
        }
        let in_window = in_count || self.is_recent(message);

        if own {
            if in_count {
                return Verdict::Preserve(PreserveReason::Count);
            }
            if in_window {
                return Verdict::Preserve(PreserveReason::Recency);
            }
            return Verdict::Delete;
        }

        // Another author's message, or a kind the platform will not let
        // the user delete. Only its reactions are in play.
        if self.policy.delete_reactions && message.own_reactions().next().is_some() {
            if in_window {
                return Verdict::PreserveReactions;
            }
            return Verdict::StripReactions;
        }
        Verdict::Ignore
    }

    fn is_recent(&self, message: &MessageRecord) -> bool {
        if self.policy.preserve_last.is_zero() {
            return false;
        }
        // A window too large to represent covers everything; a
        // clock-skewed future timestamp yields a negative elapsed time,
        // which is as recent as it gets.
        let Ok(window) = TimeDelta::from_std(self.policy.preserve_last) else {
            return true;
        };
        self.now - message.timestamp < window
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use cordsweep_types::{ChannelId, Emoji, MessageId, MessageKind, Reaction};

    use super::*;

    const USER: UserId = UserId::new(7);
    const OTHER: UserId = UserId::new(8);

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn message(id: u64, author: UserId, age_hours: i64) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(id),
            channel_id: ChannelId::new(1),
            author_id: author,
            timestamp: now() - TimeDelta::hours(age_hours),
            kind: MessageKind::Default,
            reactions: Vec::new(),
        }
    }

    fn with_own_reaction(mut m: MessageRecord) -> MessageRecord {
        m.reactions.push(Reaction {
            emoji: Emoji {
                name: Some("👍".into()),
                id: None,
            },
            me: true,
        });
        m
    }

    fn policy(preserve_n: u32, preserve_last_hours: u64) -> RetentionPolicy {
        RetentionPolicy {
            preserve_n,
            count_mode: CountMode::Mine,
            preserve_last: Duration::from_secs(preserve_last_hours * 3600),
            delete_reactions: false,
            current_user: USER,
        }
    }

    #[test]
    fn zero_thresholds_delete_every_own_message() {
        let p = policy(0, 0);
        assert!(p.preserves_nothing());
        let mut eval = PolicyEvaluator::new(&p, now());
        for i in 0..5 {
            assert_eq!(eval.classify(&message(100 - i, USER, 1)), Verdict::Delete);
        }
        assert_eq!(eval.kept_count(), 0);
    }

    #[test]
    fn count_budget_preserves_newest_n_own_messages() {
        let p = policy(3, 0);
        let mut eval = PolicyEvaluator::new(&p, now());
        let mut preserved = 0;
        let mut deleted = 0;
        for i in 0..10u64 {
            match eval.classify(&message(100 - i, USER, i64::try_from(i).unwrap())) {
                Verdict::Preserve(PreserveReason::Count) => preserved += 1,
                Verdict::Delete => deleted += 1,
                other => panic!("unexpected verdict {other:?}"),
            }
        }
        assert_eq!(preserved, 3);
        assert_eq!(deleted, 7);
    }

    #[test]
    fn recency_preserves_without_consuming_budget() {
        let p = policy(1, 6);
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(
            eval.classify(&message(100, USER, 1)),
            Verdict::Preserve(PreserveReason::Count)
        );
        // Budget exhausted; still inside the 6h window.
        assert_eq!(
            eval.classify(&message(99, USER, 2)),
            Verdict::Preserve(PreserveReason::Recency)
        );
        assert_eq!(eval.classify(&message(98, USER, 7)), Verdict::Delete);
        assert_eq!(eval.kept_count(), 1);
    }

    #[test]
    fn recency_window_is_strict() {
        let p = policy(0, 6);
        let mut eval = PolicyEvaluator::new(&p, now());
        // Exactly at the boundary is not "strictly younger".
        assert_eq!(eval.classify(&message(100, USER, 6)), Verdict::Delete);
    }

    #[test]
    fn mine_mode_ignores_other_authors() {
        let p = policy(2, 0);
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(eval.classify(&message(100, OTHER, 1)), Verdict::Ignore);
        assert_eq!(
            eval.classify(&message(99, USER, 2)),
            Verdict::Preserve(PreserveReason::Count)
        );
        // The foreign message did not consume budget.
        assert_eq!(eval.kept_count(), 1);
    }

    #[test]
    fn all_mode_lets_foreign_messages_consume_budget() {
        let mut p = policy(1, 0);
        p.count_mode = CountMode::All;
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(eval.classify(&message(100, OTHER, 1)), Verdict::Ignore);
        assert_eq!(eval.classify(&message(99, USER, 2)), Verdict::Delete);
    }

    #[test]
    fn system_messages_are_never_delete_candidates() {
        let p = policy(0, 0);
        let mut eval = PolicyEvaluator::new(&p, now());
        let mut m = message(100, USER, 1);
        m.kind = MessageKind::System(6);
        assert_eq!(eval.classify(&m), Verdict::Ignore);
    }

    #[test]
    fn reaction_cleanup_strips_outside_window_and_preserves_inside() {
        let mut p = policy(0, 6);
        p.delete_reactions = true;
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(
            eval.classify(&with_own_reaction(message(100, OTHER, 1))),
            Verdict::PreserveReactions
        );
        assert_eq!(
            eval.classify(&with_own_reaction(message(99, OTHER, 8))),
            Verdict::StripReactions
        );
        // No own reactions, nothing to do.
        assert_eq!(eval.classify(&message(98, OTHER, 8)), Verdict::Ignore);
    }

    #[test]
    fn reaction_cleanup_off_ignores_foreign_messages() {
        let p = policy(0, 6);
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(
            eval.classify(&with_own_reaction(message(100, OTHER, 1))),
            Verdict::Ignore
        );
    }

    #[test]
    fn unrepresentable_window_preserves_everything() {
        let mut p = policy(0, 1);
        p.preserve_last = Duration::MAX;
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(
            eval.classify(&message(100, USER, 24 * 365 * 50)),
            Verdict::Preserve(PreserveReason::Recency)
        );
    }

    #[test]
    fn future_timestamps_count_as_recent() {
        let p = policy(0, 6);
        let mut eval = PolicyEvaluator::new(&p, now());
        assert_eq!(
            eval.classify(&message(100, USER, -1)),
            Verdict::Preserve(PreserveReason::Recency)
        );
    }
}
