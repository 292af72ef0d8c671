use std::time::Duration;

use crate::error::TallyError;

/// Configuration for the event coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a submission waits for a guild's event lease before failing
    /// with [`TallyError::LockTimeout`]. Default: 5s.
    pub lock_timeout: Duration,
    /// Whether an admin reset also clears the guild's high score.
    /// Default: false — the high score is the guild's historical best and
    /// survives resets.
    pub clear_high_score_on_reset: bool,
}

impl CoordinatorConfig {
    /// Validate configuration values. Returns an error if any value is invalid.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.lock_timeout.is_zero() {
            return Err(TallyError::InvalidConfig {
                reason: "lock_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            clear_high_score_on_reset: false,
        }
    }
}
