//! Configuration for rgbclient
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, RgbError};

/// Main configuration for a supervised client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // History Configuration
    // -------------------------------------------------------------------------
    /// Number of delivered commands kept for replay to reattaching consumers.
    /// Once full, the oldest command is evicted first.
    pub history_capacity: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Connect timeout (milliseconds); 0 uses the platform's blocking connect
    pub connect_timeout_ms: u64,

    /// Disable Nagle's algorithm on established connections
    pub tcp_nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            connect_timeout_ms: 0,
            tcp_nodelay: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(RgbError::Config(
                "history capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Connect timeout as a Duration, or None for a plain blocking connect
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set how many commands the replay history holds
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Set the connect timeout (in milliseconds, 0 = no timeout)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
