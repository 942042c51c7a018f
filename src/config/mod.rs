//! # Engine Configuration
//!
//! Serde-deserializable configuration with explicit defaults. Values come
//! from optional config files layered with `AGRILINK_*` environment
//! overrides; missing sections fall back to defaults rather than failing.

pub mod loader;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use loader::ConfigManager;

/// Root engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub events: EventConfig,
    pub session: SessionConfig,
}

/// Change-feed tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Broadcast buffer depth for the store change feed
    pub feed_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            feed_capacity: 1024,
        }
    }
}

/// Live-session orchestration tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bounded window for media acquisition after the status write
    pub acquire_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5_000,
        }
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
