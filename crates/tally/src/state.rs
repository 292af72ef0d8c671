//! Per-guild and per-user counting state.
//!
//! `GuildState` is the sequence state machine's data: the next expected
//! number, the alternation guard, and the guild's best run. `UserStats` are
//! the per-(guild, user) counters the aggregator maintains. Both carry their
//! transition rules here so the aggregator and the admin reset path share one
//! implementation of each delta.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;
use crate::types::{ChannelId, GuildId, UserId};

/// One guild's counting sequence state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildState {
    pub guild_id: GuildId,
    /// Channel where counting happens. No counting is accepted until set.
    pub counting_channel_id: Option<ChannelId>,
    /// The next expected integer. Starts at 1, always >= 1.
    pub current_number: i64,
    /// Author of the last accepted count. Cleared whenever the sequence
    /// resets, so the first count after a break may come from anyone.
    pub last_counter: Option<UserId>,
    /// Highest count ever reached in this guild. Never decreases.
    pub high_score: i64,
}

impl GuildState {
    /// Fresh state for a guild with no stored row.
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            counting_channel_id: None,
            current_number: 1,
            last_counter: None,
            high_score: 0,
        }
    }

    /// The count the guild has reached: the last accepted number, or 0 right
    /// after a reset.
    pub fn current_count(&self) -> i64 {
        self.current_number - 1
    }

    /// State after accepting a count from `author`.
    pub fn advanced(&self, author: UserId) -> Self {
        let current_number = self.current_number + 1;
        Self {
            guild_id: self.guild_id,
            counting_channel_id: self.counting_channel_id,
            current_number,
            last_counter: Some(author),
            high_score: self.high_score.max(current_number - 1),
        }
    }

    /// State after a broken count: back to 1, alternation guard cleared,
    /// high score kept.
    pub fn reset_sequence(&self) -> Self {
        Self {
            guild_id: self.guild_id,
            counting_channel_id: self.counting_channel_id,
            current_number: 1,
            last_counter: None,
            high_score: self.high_score,
        }
    }

    /// Check stored-state invariants.
    ///
    /// A violation means the backing row was corrupted outside this crate.
    /// The caller must surface it for operator intervention, never guess a
    /// repair.
    pub fn verify(&self) -> Result<(), TallyError> {
        if self.current_number < 1 {
            return Err(TallyError::CorruptGuildState {
                guild_id: self.guild_id,
                reason: format!("current_number {} < 1", self.current_number),
            });
        }
        if self.high_score < 0 {
            return Err(TallyError::CorruptGuildState {
                guild_id: self.guild_id,
                reason: format!("high_score {} < 0", self.high_score),
            });
        }
        if self.current_number == 1 && self.last_counter.is_some() {
            return Err(TallyError::CorruptGuildState {
                guild_id: self.guild_id,
                reason: "last counter set while the sequence is at its start".to_string(),
            });
        }
        Ok(())
    }
}

/// One user's counting statistics within a guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub guild_id: GuildId,
    pub user_id: UserId,
    /// Correct counts contributed since the guild's streak last broke.
    pub current_streak: i64,
    /// Lifetime correct counts in this guild. Never decreases.
    pub total_score: i64,
    /// Personal best `current_streak`. Never decreases.
    pub high_score: i64,
    /// When this user last counted successfully.
    pub last_count_at: Option<DateTime<Utc>>,
}

impl UserStats {
    /// Zeroed stats for a user with no stored row.
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self {
            guild_id,
            user_id,
            current_streak: 0,
            total_score: 0,
            high_score: 0,
            last_count_at: None,
        }
    }

    /// Stats after this user contributes one accepted count at `at`.
    pub fn credited(&self, at: DateTime<Utc>) -> Self {
        let current_streak = self.current_streak + 1;
        Self {
            guild_id: self.guild_id,
            user_id: self.user_id,
            current_streak,
            total_score: self.total_score + 1,
            high_score: self.high_score.max(current_streak),
            last_count_at: Some(at),
        }
    }
}
