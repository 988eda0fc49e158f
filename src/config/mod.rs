//! Configuration module for cubist.
//!
//! Handles the `cubist.toml` settings file and environment overrides.

mod settings;

pub use settings::{CompilerSettings, PreAggregationSettings, Settings, SettingsError};
