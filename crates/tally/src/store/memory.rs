//! In-memory statistics store for tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::TallyError;
use crate::state::{GuildState, UserStats};
use crate::store::{GuildTotals, StatsStore};
use crate::types::{ChannelId, GuildId, UserId};

/// In-memory [`StatsStore`].
///
/// A single mutex guards both maps, so every operation is atomic relative to
/// the others — the same guarantee the SQL store gets from transactions.
pub struct MemoryStatsStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    guilds: HashMap<GuildId, GuildState>,
    users: HashMap<(GuildId, UserId), UserStats>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn guild_state(&self, guild_id: GuildId) -> Result<GuildState, TallyError> {
        let inner = self.inner.lock();
        let state = inner
            .guilds
            .get(&guild_id)
            .cloned()
            .unwrap_or_else(|| GuildState::new(guild_id));
        state.verify()?;
        Ok(state)
    }

    async fn set_counting_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), TallyError> {
        let mut inner = self.inner.lock();
        inner
            .guilds
            .entry(guild_id)
            .or_insert_with(|| GuildState::new(guild_id))
            .counting_channel_id = Some(channel_id);
        Ok(())
    }

    async fn commit_accept(
        &self,
        state: &GuildState,
        author: UserId,
        at: DateTime<Utc>,
    ) -> Result<UserStats, TallyError> {
        let mut inner = self.inner.lock();
        inner.guilds.insert(state.guild_id, state.clone());
        let stats = inner
            .users
            .entry((state.guild_id, author))
            .or_insert_with(|| UserStats::new(state.guild_id, author));
        *stats = stats.credited(at);
        Ok(stats.clone())
    }

    async fn commit_break(&self, state: &GuildState) -> Result<(), TallyError> {
        let mut inner = self.inner.lock();
        inner.guilds.insert(state.guild_id, state.clone());
        for stats in inner
            .users
            .values_mut()
            .filter(|stats| stats.guild_id == state.guild_id)
        {
            stats.current_streak = 0;
        }
        Ok(())
    }

    async fn reset_guild(
        &self,
        guild_id: GuildId,
        clear_high_score: bool,
    ) -> Result<u64, TallyError> {
        let mut inner = self.inner.lock();
        {
            let state = inner
                .guilds
                .entry(guild_id)
                .or_insert_with(|| GuildState::new(guild_id));
            *state = state.reset_sequence();
            if clear_high_score {
                state.high_score = 0;
            }
        }
        let before = inner.users.len();
        inner.users.retain(|(guild, _), _| *guild != guild_id);
        Ok((before - inner.users.len()) as u64)
    }

    async fn remove_guild(&self, guild_id: GuildId) -> Result<(), TallyError> {
        let mut inner = self.inner.lock();
        inner.guilds.remove(&guild_id);
        inner.users.retain(|(guild, _), _| *guild != guild_id);
        Ok(())
    }

    async fn user_stats(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<UserStats, TallyError> {
        let inner = self.inner.lock();
        Ok(inner
            .users
            .get(&(guild_id, user_id))
            .cloned()
            .unwrap_or_else(|| UserStats::new(guild_id, user_id)))
    }

    async fn guild_totals(&self) -> Result<Vec<GuildTotals>, TallyError> {
        let inner = self.inner.lock();
        let mut totals: Vec<GuildTotals> = inner
            .guilds
            .values()
            .map(|state| GuildTotals {
                guild_id: state.guild_id,
                current_count: state.current_count(),
                high_score: state.high_score,
                total_score: inner
                    .users
                    .values()
                    .filter(|stats| stats.guild_id == state.guild_id)
                    .map(|stats| stats.total_score)
                    .sum(),
            })
            .collect();
        totals.sort_by_key(|t| t.guild_id);
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId(1);
    const CHANNEL: ChannelId = ChannelId(100);
    const ALICE: UserId = UserId(10);
    const BOB: UserId = UserId(20);

    #[tokio::test]
    async fn unknown_guild_reads_as_fresh_state() {
        let store = MemoryStatsStore::new();
        let state = store.guild_state(GUILD).await.unwrap();
        assert_eq!(state, GuildState::new(GUILD));
    }

    #[tokio::test]
    async fn set_channel_creates_and_overwrites() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();
        let state = store.guild_state(GUILD).await.unwrap();
        assert_eq!(state.counting_channel_id, Some(CHANNEL));

        let other = ChannelId(200);
        store.set_counting_channel(GUILD, other).await.unwrap();
        let state = store.guild_state(GUILD).await.unwrap();
        assert_eq!(state.counting_channel_id, Some(other));
        assert_eq!(state.current_number, 1);
    }

    #[tokio::test]
    async fn commit_accept_writes_state_and_credits_the_author() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();

        let state = store.guild_state(GUILD).await.unwrap().advanced(ALICE);
        let stats = store
            .commit_accept(&state, ALICE, Utc::now())
            .await
            .unwrap();

        assert_eq!(stats.total_score, 1);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.high_score, 1);
        assert!(stats.last_count_at.is_some());

        let stored = store.guild_state(GUILD).await.unwrap();
        assert_eq!(stored.current_number, 2);
        assert_eq!(stored.last_counter, Some(ALICE));
    }

    #[tokio::test]
    async fn commit_break_zeroes_streaks_but_not_totals() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();

        let mut state = store.guild_state(GUILD).await.unwrap();
        for author in [ALICE, BOB] {
            state = state.advanced(author);
            store.commit_accept(&state, author, Utc::now()).await.unwrap();
        }

        store.commit_break(&state.reset_sequence()).await.unwrap();

        let alice = store.user_stats(GUILD, ALICE).await.unwrap();
        assert_eq!(alice.current_streak, 0);
        assert_eq!(alice.total_score, 1);

        let stored = store.guild_state(GUILD).await.unwrap();
        assert_eq!(stored.current_number, 1);
        assert!(stored.last_counter.is_none());
        assert_eq!(stored.high_score, 2);
    }

    #[tokio::test]
    async fn reset_guild_deletes_user_rows_and_reports_the_count() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();

        let mut state = store.guild_state(GUILD).await.unwrap();
        for author in [ALICE, BOB] {
            state = state.advanced(author);
            store.commit_accept(&state, author, Utc::now()).await.unwrap();
        }

        let deleted = store.reset_guild(GUILD, false).await.unwrap();
        assert_eq!(deleted, 2);

        let stored = store.guild_state(GUILD).await.unwrap();
        assert_eq!(stored.current_number, 1);
        assert_eq!(stored.high_score, 2);
        assert_eq!(
            store.user_stats(GUILD, ALICE).await.unwrap().total_score,
            0
        );
    }

    #[tokio::test]
    async fn reset_guild_can_clear_the_high_score() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();
        let state = store.guild_state(GUILD).await.unwrap().advanced(ALICE);
        store.commit_accept(&state, ALICE, Utc::now()).await.unwrap();

        store.reset_guild(GUILD, true).await.unwrap();
        let stored = store.guild_state(GUILD).await.unwrap();
        assert_eq!(stored.high_score, 0);
    }

    #[tokio::test]
    async fn reset_only_touches_the_target_guild() {
        let store = MemoryStatsStore::new();
        let other = GuildId::new(2);
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();
        store.set_counting_channel(other, CHANNEL).await.unwrap();

        let state = store.guild_state(other).await.unwrap().advanced(ALICE);
        store.commit_accept(&state, ALICE, Utc::now()).await.unwrap();

        store.reset_guild(GUILD, false).await.unwrap();
        assert_eq!(
            store.user_stats(other, ALICE).await.unwrap().total_score,
            1
        );
    }

    #[tokio::test]
    async fn remove_guild_drops_everything() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();
        let state = store.guild_state(GUILD).await.unwrap().advanced(ALICE);
        store.commit_accept(&state, ALICE, Utc::now()).await.unwrap();

        store.remove_guild(GUILD).await.unwrap();
        assert_eq!(store.guild_totals().await.unwrap(), vec![]);
        assert_eq!(store.guild_state(GUILD).await.unwrap(), GuildState::new(GUILD));
    }

    #[tokio::test]
    async fn totals_sum_user_scores_per_guild() {
        let store = MemoryStatsStore::new();
        store.set_counting_channel(GUILD, CHANNEL).await.unwrap();

        let mut state = store.guild_state(GUILD).await.unwrap();
        for author in [ALICE, BOB, ALICE] {
            state = state.advanced(author);
            store.commit_accept(&state, author, Utc::now()).await.unwrap();
        }

        let totals = store.guild_totals().await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].current_count, 3);
        assert_eq!(totals[0].high_score, 3);
        assert_eq!(totals[0].total_score, 3);
    }

    #[tokio::test]
    async fn corrupt_row_surfaces_instead_of_being_repaired() {
        let store = MemoryStatsStore::new();
        {
            let mut inner = store.inner.lock();
            let mut state = GuildState::new(GUILD);
            state.current_number = -4;
            inner.guilds.insert(GUILD, state);
        }

        let err = store.guild_state(GUILD).await.unwrap_err();
        assert!(matches!(err, TallyError::CorruptGuildState { .. }));
    }
}
