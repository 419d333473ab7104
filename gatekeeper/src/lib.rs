//! Request admission and bounded history for the resume chatbot.
//!
//! This crate owns the only part of the system with real invariants:
//!
//! - [`rate_limit::RateLimiter`] — durable per-key counters with lazy
//!   reset-after-idle, keyed independently by session id and by address
//!   fingerprint.
//! - [`history::ConversationStore`] — append-only per-client message log
//!   with byte-budgeted oldest-first eviction.
//! - [`reaper::Reaper`] — probabilistic, per-request reclamation of
//!   stale history.
//! - [`activity::ActivityLog`] — last-activity anchor for the reaper.
//!
//! All state lives in a shared Postgres database ([`store::Db`]); every
//! statement auto-commits. The check-then-record sequence in the rate
//! limiter and the read-then-evict sequence in the history store are
//! intentionally not transactional: concurrent requests from one client
//! can overshoot the limit by the degree of concurrency. That skew is
//! bounded and accepted.

pub mod activity;
pub mod history;
pub mod rate_limit;
pub mod reaper;
pub mod store;

pub use activity::ActivityLog;
pub use history::{ConversationStore, Message, Role};
pub use rate_limit::{Admission, RateLimitMode, RateLimiter};
pub use reaper::Reaper;
pub use store::{Db, SharedDb, StoreError, StoreResult};
