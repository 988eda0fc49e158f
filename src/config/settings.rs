//! TOML-based configuration for cubist.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! omit_errors = false
//!
//! [pre_aggregations]
//! scheduled_refresh = true
//! external = true
//! allow_non_strict_date_range_match = false
//! ```
//!
//! Pre-aggregation defaults can also be overridden from the environment with
//! `CUBIST_SCHEDULED_REFRESH_DEFAULT`, `CUBIST_EXTERNAL_DEFAULT` and
//! `CUBIST_ALLOW_NON_STRICT_DATE_RANGE_MATCH`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Compiler behaviour.
    pub compiler: CompilerSettings,

    /// Defaults applied to pre-aggregations that leave a flag unset.
    pub pre_aggregations: PreAggregationSettings,
}

/// Compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Return diagnostics to the caller instead of failing the compile.
    pub omit_errors: bool,
}

/// Pre-aggregation defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PreAggregationSettings {
    /// `scheduledRefresh` for rollup, originalSql and autoRollup.
    pub scheduled_refresh: bool,

    /// `external` for rollup and rollupJoin.
    pub external: bool,

    /// `allowNonStrictDateRangeMatch` for pre-aggregations with a time dimension.
    pub allow_non_strict_date_range_match: bool,
}

impl Default for PreAggregationSettings {
    fn default() -> Self {
        Self {
            scheduled_refresh: true,
            external: true,
            allow_non_strict_date_range_match: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse settings from TOML text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CUBIST_CONFIG`
    /// 2. `./cubist.toml`
    /// 3. `~/.config/cubist/config.toml`
    ///
    /// Environment overrides are applied on top of whatever was found.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_file()?;
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn load_file() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("CUBIST_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("cubist.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("cubist").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Apply `CUBIST_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        let defaults = &mut self.pre_aggregations;
        for (var, target) in [
            ("CUBIST_SCHEDULED_REFRESH_DEFAULT", &mut defaults.scheduled_refresh),
            ("CUBIST_EXTERNAL_DEFAULT", &mut defaults.external),
            (
                "CUBIST_ALLOW_NON_STRICT_DATE_RANGE_MATCH",
                &mut defaults.allow_non_strict_date_range_match,
            ),
        ] {
            if let Ok(raw) = env::var(var) {
                *target = parse_flag(var, &raw)?;
            }
        }
        Ok(())
    }
}

/// `true`/`false`, case-insensitive.
fn parse_flag(var: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(SettingsError::InvalidConfig(format!(
            "{} must be `true` or `false`, got `{}`",
            var, raw
        ))),
    }
}
