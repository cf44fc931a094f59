//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the demo binary
//! using the `clap` crate. These arguments are parsed at startup and then
//! merged over the configuration from the `herald.toml` file and
//! environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// An in-process notification fan-out demo.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (e.g. "info", "herald=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Default dispatch timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    pub dispatch_timeout_ms: Option<u64>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(timeout) = self.dispatch_timeout_ms {
            let mut dispatch = Dict::new();
            dispatch.insert("dispatch_timeout_ms".into(), Value::from(timeout));
            dict.insert("dispatch".into(), Value::from(dispatch));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
