use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a channel within a guild.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl ChannelId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner integer value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
