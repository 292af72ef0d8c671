//! In-memory test coordinator for unit and integration testing.
//!
//! Wraps a [`Coordinator`] over a [`MemoryStatsStore`] so tests can submit
//! events without any external dependencies.

use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;
use crate::store::MemoryStatsStore;
use crate::types::{ChannelId, GuildId};

/// A coordinator over in-memory storage.
///
/// # Example
///
/// ```ignore
/// let harness = TestCoordinator::new();
/// harness.configure(GuildId::new(1), ChannelId::new(100)).await;
/// let outcome = harness
///     .coordinator()
///     .submit_message(GuildId::new(1), UserId::new(10), "1", ChannelId::new(100))
///     .await
///     .unwrap();
/// ```
pub struct TestCoordinator {
    coordinator: Coordinator,
}

impl TestCoordinator {
    /// Create a test coordinator with default configuration.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create a test coordinator with custom configuration.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        let coordinator = Coordinator::new(Arc::new(MemoryStatsStore::new()), config)
            .expect("TestCoordinator config should be valid");
        Self { coordinator }
    }

    /// The wrapped coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Configure a guild's counting channel, panicking on failure.
    pub async fn configure(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.coordinator
            .set_counting_channel(guild_id, channel_id)
            .await
            .expect("in-memory channel configuration should not fail");
    }
}

impl Default for TestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
