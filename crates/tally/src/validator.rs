//! Sequence validation: the pure decision function for incoming messages.
//!
//! Given a guild's current state and one message event, decide whether the
//! message advances the count, breaks it, or does not participate at all.
//! No I/O happens here; applying the decision is the aggregator's job.

use serde::{Deserialize, Serialize};

use crate::state::GuildState;
use crate::types::{ChannelId, UserId};

/// Why a counting message was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The posted number was not the expected next number.
    WrongValue { expected: i64, got: i64 },
    /// The author also posted the previous accepted count. Users must
    /// alternate, even when the number itself is correct.
    RepeatUser,
}

/// Outcome of validating one message against the guild's sequence.
///
/// `Reject` means the guild's whole count breaks back to the start, not
/// merely that this one message is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The message does not participate in the game: no integer token, no
    /// configured counting channel, or posted outside it.
    Ignored,
    /// The message is the expected next count from an alternating author.
    Accept,
    /// The message breaks the count.
    Reject(RejectReason),
}

/// Decide whether a message advances, breaks, or does not participate in the
/// guild's counting sequence.
pub fn validate(
    state: &GuildState,
    channel: ChannelId,
    author: UserId,
    text: &str,
) -> Decision {
    let Some(counting_channel) = state.counting_channel_id else {
        return Decision::Ignored;
    };
    if counting_channel != channel {
        return Decision::Ignored;
    }
    let Some(number) = extract_integer(text) else {
        return Decision::Ignored;
    };

    if number != state.current_number {
        return Decision::Reject(RejectReason::WrongValue {
            expected: state.current_number,
            got: number,
        });
    }
    if state.last_counter == Some(author) {
        return Decision::Reject(RejectReason::RepeatUser);
    }
    Decision::Accept
}

/// Find the first whitespace-delimited integer token in a message.
///
/// The message may contain other text around the number. Messages without any
/// parseable token do not participate in the game.
pub fn extract_integer(text: &str) -> Option<i64> {
    text.split_whitespace()
        .find_map(|token| token.parse::<i64>().ok())
}
