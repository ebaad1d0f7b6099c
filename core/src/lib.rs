//! The retention engine: everything between parsed arguments and the
//! network boundary.
//!
//! # Architecture
//!
//! A run flows through four stages, each owned by one module:
//!
//! - [`scope`] - Which discovered channels are in scope, from the
//!   include/exclude ID lists.
//! - [`policy`] - Which messages to keep, from the count and age
//!   thresholds. Pure classification; no I/O.
//! - [`cache`] - The preserved-ID record carried between runs, so a
//!   narrow fetch window does not forget older preserved items.
//! - [`sweep`] - The per-channel pipeline that ties them together:
//!   fetch, merge cached IDs, classify, act, persist.
//!
//! Channels are processed sequentially on a single task. Cancellation is
//! cooperative: a [`CancelFlag`] is checked between channels and between
//! messages, never mid-request.

pub mod cache;
pub mod policy;
pub mod scope;
pub mod sweep;

pub use cache::{ChannelEntry, PreserveCache};
pub use policy::{CountMode, PolicyEvaluator, PreserveReason, RetentionPolicy, Verdict};
pub use scope::ScopeResolver;
pub use sweep::{CancelFlag, ChannelTree, RunSummary, SweepError, SweepOptions, Sweeper, discover};
