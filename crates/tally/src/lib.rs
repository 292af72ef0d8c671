//! Multi-tenant counting game coordinator.
//!
//! Each guild runs an incrementing integer sequence posted one message at a
//! time by alternating members. The coordinator validates every entry against
//! the sequencing and turn-alternation rules, maintains per-user and
//! per-guild statistics behind a transactional store contract, and ranks
//! guilds against each other on three metrics.
//!
//! The chat-platform gateway is not part of this crate: the host feeds
//! message events into [`coordinator::Coordinator::submit_message`] and turns
//! the returned [`aggregator::SubmitOutcome`] into reactions or replies.
//!
//! Events for one guild are strictly serialized; events for different guilds
//! run in parallel. See [`coordinator`] for the concurrency model and
//! [`store`] for the persistence contract.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod state;
pub mod store;
pub mod testing;
pub mod types;
pub mod validator;

/// Prelude module for convenient glob imports.
pub mod prelude {
    pub use crate::aggregator::SubmitOutcome;
    pub use crate::config::CoordinatorConfig;
    pub use crate::coordinator::{Coordinator, ResetOutcome};
    pub use crate::error::TallyError;
    pub use crate::leaderboard::{GuildRank, LeaderboardEntry, Metric};
    pub use crate::state::{GuildState, UserStats};
    pub use crate::store::{GuildTotals, MemoryStatsStore, StatsStore};
    pub use crate::types::{ChannelId, GuildId, UserId};
    pub use crate::validator::{Decision, RejectReason};

    #[cfg(feature = "sql")]
    pub use crate::store::SqlStatsStore;
}
