//! Configuration management for herald
//!
//! This module defines the main `Config` struct, responsible for holding
//! all application settings. It uses the `figment` crate to layer a
//! `herald.toml` file, `HERALD_`-prefixed environment variables, and
//! command-line arguments over built-in defaults.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the background dispatcher.
    pub dispatch: DispatcherConfig,
}

/// Configuration for the background dispatcher.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DispatcherConfig {
    /// Default timeout applied to a dispatch when the caller does not pass
    /// one explicitly, in milliseconds. Absent means the dispatcher waits
    /// indefinitely for handlers to complete.
    pub dispatch_timeout_ms: Option<u64>,
}

impl DispatcherConfig {
    /// The configured default timeout as a `Duration`, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// the TOML file, environment variables, and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = &cli.config {
            figment = figment.merge(Toml::file(path));
        } else {
            figment = figment.merge(Toml::file("herald.toml"));
        }

        let config: Config = figment
            // Allow overriding with environment variables, e.g.
            // HERALD_DISPATCH__DISPATCH_TIMEOUT_MS=5000
            .merge(Env::prefixed("HERALD_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dispatch: DispatcherConfig::default(),
        }
    }
}
