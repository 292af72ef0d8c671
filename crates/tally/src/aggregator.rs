//! Applies a validated decision's consequences to persistent state.
//!
//! The aggregator computes the new guild state and the per-user counter
//! deltas for a decision, then commits them through a single [`StatsStore`]
//! transaction. Partial application — state advanced without the stats, or
//! the other way round — would violate the store contract, so each branch
//! maps to exactly one store commit operation.

use std::sync::Arc;

use chrono::Utc;

use crate::error::TallyError;
use crate::state::{GuildState, UserStats};
use crate::store::StatsStore;
use crate::types::UserId;
use crate::validator::{Decision, RejectReason};

/// Result of submitting one message, with the counters after application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The message does not participate in the game. Nothing changed.
    Ignored,
    /// The count advanced. Carries the guild state and the author's stats
    /// after the credit.
    Accepted { state: GuildState, user: UserStats },
    /// The count broke and the sequence reset. Carries the state after the
    /// reset.
    Rejected {
        reason: RejectReason,
        state: GuildState,
    },
}

/// Apply `decision` for `author` on top of `state`.
///
/// Accept and reject each persist through one store transaction; an ignored
/// decision never touches the store. The caller must hold the guild's event
/// lease so no other event interleaves between the state read and this
/// commit.
pub async fn apply_outcome(
    store: &Arc<dyn StatsStore>,
    state: &GuildState,
    author: UserId,
    decision: &Decision,
) -> Result<SubmitOutcome, TallyError> {
    match decision {
        Decision::Ignored => Ok(SubmitOutcome::Ignored),
        Decision::Accept => {
            let new_state = state.advanced(author);
            let user = store.commit_accept(&new_state, author, Utc::now()).await?;
            Ok(SubmitOutcome::Accepted {
                state: new_state,
                user,
            })
        }
        Decision::Reject(reason) => {
            let new_state = state.reset_sequence();
            store.commit_break(&new_state).await?;
            Ok(SubmitOutcome::Rejected {
                reason: *reason,
                state: new_state,
            })
        }
    }
}
