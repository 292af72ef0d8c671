//! Event coordination: per-guild serialization of validate + apply.
//!
//! The host delivers message events from many guilds concurrently. For any
//! single guild, events must be validated and applied strictly one at a time
//! in arrival order; across guilds there is no ordering requirement. The
//! coordinator enforces this with an exclusive per-guild lease held for the
//! duration of one load + validate + commit, never across suspensions the
//! caller can observe.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::aggregator::{self, SubmitOutcome};
use crate::config::CoordinatorConfig;
use crate::error::TallyError;
use crate::leaderboard::{self, GuildRank, LeaderboardEntry, Metric};
use crate::metrics::CountingMetrics;
use crate::state::{GuildState, UserStats};
use crate::store::StatsStore;
use crate::types::{ChannelId, GuildId, UserId};
use crate::validator;

/// Outcome of an admin reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOutcome {
    /// Number of user stat rows deleted by the reset.
    pub affected_users: u64,
}

type GuildLocks = DashMap<GuildId, Arc<Mutex<()>>>;

/// Serializes events per guild and drives validate → apply as one atomic
/// step against the [`StatsStore`].
///
/// Events for different guilds proceed fully in parallel. The lock table
/// holds one entry per guild seen by this process; entries are never removed
/// while the coordinator lives, so a lease for a guild is always the same
/// mutex.
pub struct Coordinator {
    store: Arc<dyn StatsStore>,
    locks: GuildLocks,
    config: CoordinatorConfig,
    metrics: Arc<CountingMetrics>,
}

impl Coordinator {
    /// Create a coordinator over the given store.
    pub fn new(
        store: Arc<dyn StatsStore>,
        config: CoordinatorConfig,
    ) -> Result<Self, TallyError> {
        config.validate()?;
        Ok(Self {
            store,
            locks: DashMap::new(),
            config,
            metrics: Arc::new(CountingMetrics::unregistered()),
        })
    }

    /// Replace the metrics sink (e.g. with a registry-backed one).
    pub fn with_metrics(mut self, metrics: Arc<CountingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Acquire the exclusive event lease for a guild, bounded by the
    /// configured timeout.
    ///
    /// A timeout means some other event is stuck holding the lease; the
    /// caller gets an error rather than a silently skipped or reordered
    /// event.
    async fn guild_lease(&self, guild_id: GuildId) -> Result<OwnedMutexGuard<()>, TallyError> {
        let lock = self
            .locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        self.metrics.guilds.set(self.locks.len() as i64);

        match tokio::time::timeout(self.config.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                self.metrics.lock_timeouts.inc();
                warn!(guild_id = %guild_id, "timed out waiting for guild event lease");
                Err(TallyError::LockTimeout { guild_id })
            }
        }
    }

    /// Submit one message event for validation and application.
    ///
    /// Returns the decision outcome with the updated counters. An `Err` means
    /// the event was not processed at all (lease timeout, store failure,
    /// corrupt state) — distinct from a content-based rejection, so the
    /// caller must not react as if the count were wrong.
    #[instrument(skip_all, fields(guild_id = %guild_id, author = %author))]
    pub async fn submit_message(
        &self,
        guild_id: GuildId,
        author: UserId,
        text: &str,
        channel: ChannelId,
    ) -> Result<SubmitOutcome, TallyError> {
        let _lease = self.guild_lease(guild_id).await?;

        let state = self.store.guild_state(guild_id).await?;
        let decision = validator::validate(&state, channel, author, text);
        let outcome = aggregator::apply_outcome(&self.store, &state, author, &decision).await?;

        match &outcome {
            SubmitOutcome::Ignored => {
                self.metrics.ignored.inc();
            }
            SubmitOutcome::Accepted { state, .. } => {
                self.metrics.accepted.inc();
                debug!(count = state.current_count(), "count accepted");
            }
            SubmitOutcome::Rejected { reason, .. } => {
                self.metrics.rejected.inc();
                info!(?reason, "count broken, sequence reset");
            }
        }

        Ok(outcome)
    }

    /// Set (or overwrite) the guild's counting channel. Idempotent; does not
    /// touch the sequence.
    #[instrument(skip_all, fields(guild_id = %guild_id, channel_id = %channel_id))]
    pub async fn set_counting_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), TallyError> {
        let _lease = self.guild_lease(guild_id).await?;
        self.store.set_counting_channel(guild_id, channel_id).await?;
        info!("counting channel set");
        Ok(())
    }

    /// Reset the guild's count and delete its user statistics.
    ///
    /// The high score survives unless
    /// [`CoordinatorConfig::clear_high_score_on_reset`] says otherwise. The
    /// `reason` is recorded in the log only.
    #[instrument(skip_all, fields(guild_id = %guild_id))]
    pub async fn reset_count(
        &self,
        guild_id: GuildId,
        reason: &str,
    ) -> Result<ResetOutcome, TallyError> {
        let _lease = self.guild_lease(guild_id).await?;
        let affected = self
            .store
            .reset_guild(guild_id, self.config.clear_high_score_on_reset)
            .await?;
        info!(affected_users = affected, reason, "count reset");
        Ok(ResetOutcome {
            affected_users: affected,
        })
    }

    /// Delete a guild and all its statistics (e.g. when the host leaves it).
    #[instrument(skip_all, fields(guild_id = %guild_id))]
    pub async fn remove_guild(&self, guild_id: GuildId) -> Result<(), TallyError> {
        let _lease = self.guild_lease(guild_id).await?;
        self.store.remove_guild(guild_id).await?;
        info!("guild removed");
        Ok(())
    }

    /// Read the guild's current sequence state.
    pub async fn guild_snapshot(&self, guild_id: GuildId) -> Result<GuildState, TallyError> {
        self.store.guild_state(guild_id).await
    }

    /// Read one user's statistics in a guild.
    pub async fn user_stats(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<UserStats, TallyError> {
        self.store.user_stats(guild_id, user_id).await
    }

    /// Rank all guilds by the given metric.
    pub async fn leaderboard(&self, metric: Metric) -> Result<Vec<LeaderboardEntry>, TallyError> {
        let snapshot = self.store.guild_totals().await?;
        Ok(leaderboard::rank(&snapshot, metric))
    }

    /// Rank one guild across all three metrics.
    pub async fn guild_rank(&self, guild_id: GuildId) -> Result<GuildRank, TallyError> {
        let snapshot = self.store.guild_totals().await?;
        Ok(leaderboard::guild_rank(&snapshot, guild_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStatsStore;
    use crate::validator::RejectReason;

    const GUILD: GuildId = GuildId(1);
    const CHANNEL: ChannelId = ChannelId(100);
    const ALICE: UserId = UserId(10);
    const BOB: UserId = UserId(20);

    async fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(
            Arc::new(MemoryStatsStore::new()),
            CoordinatorConfig::default(),
        )
        .unwrap();
        coordinator
            .set_counting_channel(GUILD, CHANNEL)
            .await
            .unwrap();
        coordinator
    }

    #[tokio::test]
    async fn first_count_advances_the_guild() {
        let coordinator = coordinator().await;

        let outcome = coordinator
            .submit_message(GUILD, ALICE, "1", CHANNEL)
            .await
            .unwrap();

        let SubmitOutcome::Accepted { state, user } = outcome else {
            panic!("expected accepted outcome");
        };
        assert_eq!(state.current_number, 2);
        assert_eq!(state.last_counter, Some(ALICE));
        assert_eq!(user.total_score, 1);
    }

    #[tokio::test]
    async fn message_outside_counting_channel_is_ignored() {
        let coordinator = coordinator().await;

        let outcome = coordinator
            .submit_message(GUILD, ALICE, "1", ChannelId::new(999))
            .await
            .unwrap();

        assert_eq!(outcome, SubmitOutcome::Ignored);
        let state = coordinator.guild_snapshot(GUILD).await.unwrap();
        assert_eq!(state.current_number, 1);
    }

    #[tokio::test]
    async fn repeat_user_breaks_the_count() {
        let coordinator = coordinator().await;
        coordinator
            .submit_message(GUILD, ALICE, "1", CHANNEL)
            .await
            .unwrap();

        let outcome = coordinator
            .submit_message(GUILD, ALICE, "2", CHANNEL)
            .await
            .unwrap();

        let SubmitOutcome::Rejected { reason, state } = outcome else {
            panic!("expected rejected outcome");
        };
        assert_eq!(reason, RejectReason::RepeatUser);
        assert_eq!(state.current_number, 1);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_construction() {
        let err = Coordinator::new(
            Arc::new(MemoryStatsStore::new()),
            CoordinatorConfig {
                lock_timeout: std::time::Duration::ZERO,
                ..Default::default()
            },
        )
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, TallyError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn reset_reports_deleted_user_rows() {
        let coordinator = coordinator().await;
        coordinator
            .submit_message(GUILD, ALICE, "1", CHANNEL)
            .await
            .unwrap();
        coordinator
            .submit_message(GUILD, BOB, "2", CHANNEL)
            .await
            .unwrap();

        let outcome = coordinator.reset_count(GUILD, "test cleanup").await.unwrap();
        assert_eq!(outcome.affected_users, 2);

        let state = coordinator.guild_snapshot(GUILD).await.unwrap();
        assert_eq!(state.current_number, 1);
        assert_eq!(state.high_score, 2);
    }
}
