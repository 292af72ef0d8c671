use crate::types::GuildId;

/// Errors that can occur in the counting coordinator.
///
/// Validation outcomes (accepted, rejected, ignored) are not errors; they are
/// values returned from `submit_message`. An `Err` here always means the event
/// could not be processed at all.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("persistence error: {reason}")]
    PersistenceError {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("timed out waiting for the event lease on guild {guild_id}")]
    LockTimeout { guild_id: GuildId },

    #[error("corrupt stored state for guild {guild_id}: {reason}")]
    CorruptGuildState { guild_id: GuildId, reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}
