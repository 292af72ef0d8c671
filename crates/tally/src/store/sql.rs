//! SQL-backed statistics store using PostgreSQL via sqlx.
//!
//! Tables:
//! - `counting_guilds` — one row per guild: channel configuration and sequence state
//! - `counting_user_stats` — one row per (guild, user): streak and score counters
//!
//! This module is only available when the `sql` feature is enabled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::TallyError;
use crate::state::{GuildState, UserStats};
use crate::store::{GuildTotals, StatsStore};
use crate::types::{ChannelId, GuildId, UserId};

/// PostgreSQL-backed statistics store.
pub struct SqlStatsStore {
    pool: PgPool,
}

impl SqlStatsStore {
    /// Create a new SQL statistics store with the given connection pool.
    ///
    /// **Important:** Call [`migrate()`](Self::migrate) before using the store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations. Safe to call multiple times — migrations are
    /// idempotent.
    pub async fn migrate(&self) -> Result<(), TallyError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("migration failed: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

fn guild_state_from_row(guild_id: GuildId, row: &sqlx::postgres::PgRow) -> Result<GuildState, TallyError> {
    let counting_channel_id: Option<i64> =
        row.try_get("counting_channel_id")
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("failed to read 'counting_channel_id' column: {e}"),
                source: Some(Box::new(e)),
            })?;
    let current_number: i64 =
        row.try_get("current_number")
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("failed to read 'current_number' column: {e}"),
                source: Some(Box::new(e)),
            })?;
    let last_counter: Option<i64> =
        row.try_get("last_counter")
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("failed to read 'last_counter' column: {e}"),
                source: Some(Box::new(e)),
            })?;
    let high_score: i64 = row
        .try_get("high_score")
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("failed to read 'high_score' column: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(GuildState {
        guild_id,
        counting_channel_id: counting_channel_id.map(ChannelId::new),
        current_number,
        last_counter: last_counter.map(UserId::new),
        high_score,
    })
}

fn user_stats_from_row(
    guild_id: GuildId,
    user_id: UserId,
    row: &sqlx::postgres::PgRow,
) -> Result<UserStats, TallyError> {
    let current_streak: i64 =
        row.try_get("current_streak")
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("failed to read 'current_streak' column: {e}"),
                source: Some(Box::new(e)),
            })?;
    let total_score: i64 = row
        .try_get("total_score")
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("failed to read 'total_score' column: {e}"),
            source: Some(Box::new(e)),
        })?;
    let high_score: i64 = row
        .try_get("high_score")
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("failed to read 'high_score' column: {e}"),
            source: Some(Box::new(e)),
        })?;
    let last_count_at: Option<DateTime<Utc>> =
        row.try_get("last_count_at")
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("failed to read 'last_count_at' column: {e}"),
                source: Some(Box::new(e)),
            })?;

    Ok(UserStats {
        guild_id,
        user_id,
        current_streak,
        total_score,
        high_score,
        last_count_at,
    })
}

#[async_trait]
impl StatsStore for SqlStatsStore {
    async fn guild_state(&self, guild_id: GuildId) -> Result<GuildState, TallyError> {
        let row = sqlx::query(
            "SELECT counting_channel_id, current_number, last_counter, high_score
             FROM counting_guilds WHERE guild_id = $1",
        )
        .bind(guild_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("guild state load failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        match row {
            Some(row) => {
                let state = guild_state_from_row(guild_id, &row)?;
                state.verify()?;
                Ok(state)
            }
            None => Ok(GuildState::new(guild_id)),
        }
    }

    async fn set_counting_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), TallyError> {
        sqlx::query(
            "INSERT INTO counting_guilds (guild_id, counting_channel_id, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (guild_id)
             DO UPDATE SET counting_channel_id = $2, updated_at = NOW()",
        )
        .bind(guild_id.value())
        .bind(channel_id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("set counting channel failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(())
    }

    async fn commit_accept(
        &self,
        state: &GuildState,
        author: UserId,
        at: DateTime<Utc>,
    ) -> Result<UserStats, TallyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("begin transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        sqlx::query(
            "INSERT INTO counting_guilds
                 (guild_id, counting_channel_id, current_number, last_counter, high_score, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW())
             ON CONFLICT (guild_id)
             DO UPDATE SET counting_channel_id = $2, current_number = $3,
                           last_counter = $4, high_score = $5, updated_at = NOW()",
        )
        .bind(state.guild_id.value())
        .bind(state.counting_channel_id.map(|c| c.value()))
        .bind(state.current_number)
        .bind(state.last_counter.map(|u| u.value()))
        .bind(state.high_score)
        .execute(&mut *tx)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("guild state write failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        // The credit rules (streak + 1, lifetime + 1, personal best raised)
        // are expressed in SQL so the lazily-created row and the update share
        // one statement.
        let row = sqlx::query(
            "INSERT INTO counting_user_stats
                 (guild_id, user_id, current_streak, total_score, high_score, last_count_at, updated_at)
             VALUES ($1, $2, 1, 1, 1, $3, NOW())
             ON CONFLICT (guild_id, user_id)
             DO UPDATE SET
                 current_streak = counting_user_stats.current_streak + 1,
                 total_score = counting_user_stats.total_score + 1,
                 high_score = GREATEST(counting_user_stats.high_score,
                                       counting_user_stats.current_streak + 1),
                 last_count_at = $3,
                 updated_at = NOW()
             RETURNING current_streak, total_score, high_score, last_count_at",
        )
        .bind(state.guild_id.value())
        .bind(author.value())
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("user stats credit failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let stats = user_stats_from_row(state.guild_id, author, &row)?;

        tx.commit()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("commit transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(stats)
    }

    async fn commit_break(&self, state: &GuildState) -> Result<(), TallyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("begin transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        sqlx::query(
            "INSERT INTO counting_guilds
                 (guild_id, counting_channel_id, current_number, last_counter, high_score, updated_at)
             VALUES ($1, $2, $3, NULL, $4, NOW())
             ON CONFLICT (guild_id)
             DO UPDATE SET counting_channel_id = $2, current_number = $3,
                           last_counter = NULL, high_score = $4, updated_at = NOW()",
        )
        .bind(state.guild_id.value())
        .bind(state.counting_channel_id.map(|c| c.value()))
        .bind(state.current_number)
        .bind(state.high_score)
        .execute(&mut *tx)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("guild reset write failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        sqlx::query(
            "UPDATE counting_user_stats SET current_streak = 0, updated_at = NOW()
             WHERE guild_id = $1",
        )
        .bind(state.guild_id.value())
        .execute(&mut *tx)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("streak reset failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        tx.commit()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("commit transaction failed: {e}"),
                source: Some(Box::new(e)),
            })
    }

    async fn reset_guild(
        &self,
        guild_id: GuildId,
        clear_high_score: bool,
    ) -> Result<u64, TallyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("begin transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        sqlx::query(
            "INSERT INTO counting_guilds (guild_id, updated_at)
             VALUES ($1, NOW())
             ON CONFLICT (guild_id)
             DO UPDATE SET current_number = 1, last_counter = NULL,
                           high_score = CASE WHEN $2 THEN 0
                                             ELSE counting_guilds.high_score END,
                           updated_at = NOW()",
        )
        .bind(guild_id.value())
        .bind(clear_high_score)
        .execute(&mut *tx)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("guild reset failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let deleted = sqlx::query("DELETE FROM counting_user_stats WHERE guild_id = $1")
            .bind(guild_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("user stats delete failed: {e}"),
                source: Some(Box::new(e)),
            })?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("commit transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(deleted)
    }

    async fn remove_guild(&self, guild_id: GuildId) -> Result<(), TallyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("begin transaction failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        sqlx::query("DELETE FROM counting_user_stats WHERE guild_id = $1")
            .bind(guild_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("user stats delete failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        sqlx::query("DELETE FROM counting_guilds WHERE guild_id = $1")
            .bind(guild_id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("guild delete failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        tx.commit()
            .await
            .map_err(|e| TallyError::PersistenceError {
                reason: format!("commit transaction failed: {e}"),
                source: Some(Box::new(e)),
            })
    }

    async fn user_stats(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<UserStats, TallyError> {
        let row = sqlx::query(
            "SELECT current_streak, total_score, high_score, last_count_at
             FROM counting_user_stats WHERE guild_id = $1 AND user_id = $2",
        )
        .bind(guild_id.value())
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("user stats load failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        match row {
            Some(row) => user_stats_from_row(guild_id, user_id, &row),
            None => Ok(UserStats::new(guild_id, user_id)),
        }
    }

    async fn guild_totals(&self) -> Result<Vec<GuildTotals>, TallyError> {
        let rows = sqlx::query(
            "SELECT g.guild_id,
                    g.current_number - 1 AS current_count,
                    g.high_score,
                    COALESCE(SUM(u.total_score), 0)::BIGINT AS total_score
             FROM counting_guilds g
             LEFT JOIN counting_user_stats u ON u.guild_id = g.guild_id
             GROUP BY g.guild_id, g.current_number, g.high_score
             ORDER BY g.guild_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TallyError::PersistenceError {
            reason: format!("guild totals load failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        rows.into_iter()
            .map(|row| {
                let guild_id: i64 =
                    row.try_get("guild_id")
                        .map_err(|e| TallyError::PersistenceError {
                            reason: format!("failed to read 'guild_id' column: {e}"),
                            source: Some(Box::new(e)),
                        })?;
                let current_count: i64 =
                    row.try_get("current_count")
                        .map_err(|e| TallyError::PersistenceError {
                            reason: format!("failed to read 'current_count' column: {e}"),
                            source: Some(Box::new(e)),
                        })?;
                let high_score: i64 =
                    row.try_get("high_score")
                        .map_err(|e| TallyError::PersistenceError {
                            reason: format!("failed to read 'high_score' column: {e}"),
                            source: Some(Box::new(e)),
                        })?;
                let total_score: i64 =
                    row.try_get("total_score")
                        .map_err(|e| TallyError::PersistenceError {
                            reason: format!("failed to read 'total_score' column: {e}"),
                            source: Some(Box::new(e)),
                        })?;

                Ok(GuildTotals {
                    guild_id: GuildId::new(guild_id),
                    current_count,
                    high_score,
                    total_score,
                })
            })
            .collect()
    }
}
