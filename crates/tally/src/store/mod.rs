//! Persistent statistics storage.
//!
//! [`MemoryStatsStore`] keeps everything in process memory for tests and
//! single-process runs. [`SqlStatsStore`] (feature `sql`) persists to
//! PostgreSQL via sqlx.

mod memory;

#[cfg(feature = "sql")]
mod sql;

pub use memory::MemoryStatsStore;

#[cfg(feature = "sql")]
pub use sql::SqlStatsStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;
use crate::state::{GuildState, UserStats};
use crate::types::{ChannelId, GuildId, UserId};

/// One guild's aggregate metrics, as ranked by the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildTotals {
    pub guild_id: GuildId,
    /// The count the guild has currently reached (`current_number - 1`).
    pub current_count: i64,
    /// The guild's best count ever reached.
    pub high_score: i64,
    /// Lifetime correct counts summed over the guild's users.
    pub total_score: i64,
}

/// Durable per-guild and per-(guild, user) counting statistics.
///
/// The two commit operations are transactional: the guild row and the
/// affected user rows become visible together or not at all. Observing a
/// guild state advanced without its user stats update (or vice versa) is a
/// contract violation.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Load a guild's state, or the fresh default if none is stored.
    ///
    /// Stored rows are invariant-checked on read; violations surface as
    /// [`TallyError::CorruptGuildState`] and are never silently repaired.
    async fn guild_state(&self, guild_id: GuildId) -> Result<GuildState, TallyError>;

    /// Set (or overwrite) the guild's counting channel, creating the guild
    /// row if absent. Does not touch the sequence.
    async fn set_counting_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), TallyError>;

    /// Persist an accepted count: the advanced guild state plus the author's
    /// credited stats row (created lazily), in one transaction.
    ///
    /// Returns the author's stats after the credit.
    async fn commit_accept(
        &self,
        state: &GuildState,
        author: UserId,
        at: DateTime<Utc>,
    ) -> Result<UserStats, TallyError>;

    /// Persist a broken count: the reset guild state, with every user streak
    /// in the guild zeroed, in one transaction.
    async fn commit_break(&self, state: &GuildState) -> Result<(), TallyError>;

    /// Admin reset: sequence back to 1, alternation cleared, all user rows
    /// deleted. Clears the guild high score only when `clear_high_score` is
    /// set. Returns the number of deleted user rows.
    async fn reset_guild(
        &self,
        guild_id: GuildId,
        clear_high_score: bool,
    ) -> Result<u64, TallyError>;

    /// Delete the guild row and all its user rows. Absent guild is a no-op.
    async fn remove_guild(&self, guild_id: GuildId) -> Result<(), TallyError>;

    /// Load a user's stats, or the zeroed default if none is stored.
    async fn user_stats(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<UserStats, TallyError>;

    /// Snapshot every known guild's leaderboard metrics.
    ///
    /// Read-only; may be slightly stale relative to concurrent writers.
    async fn guild_totals(&self) -> Result<Vec<GuildTotals>, TallyError>;
}
