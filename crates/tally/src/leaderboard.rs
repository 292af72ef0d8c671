//! Cross-guild leaderboard ranking.
//!
//! Pure functions over a full [`GuildTotals`] snapshot. Callers read the
//! snapshot from the store without taking any guild lock, so rankings may be
//! slightly stale relative to concurrent writers.

use serde::{Deserialize, Serialize};

use crate::store::GuildTotals;
use crate::types::GuildId;

/// A leaderboard metric, ranked independently across guilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// The count the guild has currently reached.
    CurrentCount,
    /// The guild's best count ever reached.
    HighScore,
    /// Lifetime correct counts summed over the guild's users.
    TotalScore,
}

impl Metric {
    fn value_of(&self, totals: &GuildTotals) -> i64 {
        match self {
            Metric::CurrentCount => totals.current_count,
            Metric::HighScore => totals.high_score,
            Metric::TotalScore => totals.total_score,
        }
    }
}

/// One guild's leaderboard position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub guild_id: GuildId,
    pub current_count: i64,
    pub high_score: i64,
    pub total_score: i64,
    /// 1-based position for the requested metric.
    pub rank: u32,
}

/// All three metric ranks for one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildRank {
    pub current_rank: u32,
    pub high_score_rank: u32,
    pub total_score_rank: u32,
}

/// Rank every guild in the snapshot by `metric`.
///
/// Descending by value; ties broken by guild id ascending, so the order is a
/// total order and repeated calls over the same snapshot agree.
pub fn rank(snapshot: &[GuildTotals], metric: Metric) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&GuildTotals> = snapshot.iter().collect();
    ordered.sort_by(|a, b| {
        metric
            .value_of(b)
            .cmp(&metric.value_of(a))
            .then(a.guild_id.cmp(&b.guild_id))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, totals)| LeaderboardEntry {
            guild_id: totals.guild_id,
            current_count: totals.current_count,
            high_score: totals.high_score,
            total_score: totals.total_score,
            rank: idx as u32 + 1,
        })
        .collect()
}

/// 1-based rank of `guild_id` for `metric`.
///
/// A guild absent from the snapshot ranks as a zero-valued guild among the
/// others, so never-active guilds still get a stable, valid position.
pub fn rank_of(snapshot: &[GuildTotals], guild_id: GuildId, metric: Metric) -> u32 {
    let value = snapshot
        .iter()
        .find(|totals| totals.guild_id == guild_id)
        .map(|totals| metric.value_of(totals))
        .unwrap_or(0);

    let ahead = snapshot
        .iter()
        .filter(|totals| totals.guild_id != guild_id)
        .filter(|totals| {
            let v = metric.value_of(totals);
            v > value || (v == value && totals.guild_id < guild_id)
        })
        .count();

    ahead as u32 + 1
}

/// Rank one guild across all three metrics.
pub fn guild_rank(snapshot: &[GuildTotals], guild_id: GuildId) -> GuildRank {
    GuildRank {
        current_rank: rank_of(snapshot, guild_id, Metric::CurrentCount),
        high_score_rank: rank_of(snapshot, guild_id, Metric::HighScore),
        total_score_rank: rank_of(snapshot, guild_id, Metric::TotalScore),
    }
}
