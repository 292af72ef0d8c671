use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a guild (an independent counting community).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GuildId(pub i64);

impl GuildId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
