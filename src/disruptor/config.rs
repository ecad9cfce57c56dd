//! Pipeline Configuration
//!
//! Serializable settings for building a [`Pipeline`](crate::disruptor::Pipeline):
//! ring size, producer arity, wait strategy and its tuning, and the size of the
//! sequence arena. Missing fields take their defaults, so `{}` is a valid config.

use crate::disruptor::{
    is_power_of_two, DisruptorError, ProducerType, Result, SleepingWaitStrategy, WaitStrategy,
    WaitStrategyType,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptorConfig {
    /// Number of ring slots; must be a power of two
    pub buffer_size: usize,

    /// Single or multiple producer threads
    pub producer_type: ProducerType,

    /// How consumers wait for progress
    pub wait_strategy: WaitStrategyType,

    /// Misses absorbed before the sleeping strategy starts to sleep
    pub sleep_retries: u32,

    /// Sleep interval of the sleeping strategy, in nanoseconds
    pub sleep_nanos: u64,

    /// Number of sequences (cursor plus one per consumer) the arena can hold
    pub arena_capacity: usize,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            producer_type: ProducerType::Multi,
            wait_strategy: WaitStrategyType::Blocking,
            sleep_retries: SleepingWaitStrategy::DEFAULT_RETRIES,
            sleep_nanos: SleepingWaitStrategy::DEFAULT_SLEEP_NANOS,
            arena_capacity: 64,
        }
    }
}

impl DisruptorConfig {
    /// Parse a configuration from JSON and validate it
    ///
    /// # Errors
    /// Returns `DisruptorError::ConfigParse` for malformed JSON, or
    /// `DisruptorError::Config` if a value is out of range
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    ///
    /// # Errors
    /// Returns `DisruptorError::Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str)
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_power_of_two(self.buffer_size) {
            return Err(self.invalid(format!(
                "buffer_size must be a power of 2, got {}",
                self.buffer_size
            )));
        }

        // Cursor plus at least one consumer
        if self.arena_capacity < 2 {
            return Err(self.invalid(format!(
                "arena_capacity must be at least 2, got {}",
                self.arena_capacity
            )));
        }

        if self.wait_strategy == WaitStrategyType::Sleep && self.sleep_nanos == 0 {
            return Err(self.invalid("sleep_nanos must be greater than 0".to_string()));
        }

        Ok(())
    }

    fn invalid(&self, message: String) -> DisruptorError {
        warn!(config = ?self, "{message}");
        DisruptorError::Config(message)
    }

    /// Build the configured wait strategy
    pub fn wait_strategy(&self) -> Arc<dyn WaitStrategy> {
        match self.wait_strategy {
            WaitStrategyType::Sleep => Arc::new(SleepingWaitStrategy::with_settings(
                self.sleep_retries,
                self.sleep_nanos,
            )),
            other => other.create(),
        }
    }
}
