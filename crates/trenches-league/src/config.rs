//! League configuration.
//!
//! [`LeagueConfig`] is layered from built-in defaults, an optional TOML
//! file and `TRENCHES__*` environment variables (`__` separates nesting,
//! e.g. `TRENCHES__POWER__PRESET=logarithmic`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trenches_core::constants::{
    DEFAULT_MAX_SCORE, DEFAULT_REFERENCE_SCORE, SIGMOID_MIDPOINT, SIGMOID_STEEPNESS,
};
use trenches_core::error::PowerError;
use trenches_power::{CallingPowerEngine, FormulaPreset, Normalization, SigmoidNormalizer};

use crate::telemetry::LogFormat;

const ENV_PREFIX: &str = "TRENCHES";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration: {0}")] Load(#[from] config::ConfigError),
    #[error(transparent)] Power(#[from] PowerError),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationKind {
    #[default]
    Identity,
    Sigmoid,
}

/// Scoring settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PowerConfig {
    pub preset: FormulaPreset,
    pub normalization: NormalizationKind,
    /// Sigmoid parameters; ignored for identity normalization.
    pub reference_score: f64,
    pub max_score: f64,
    pub steepness: f64,
    pub midpoint: f64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            preset: FormulaPreset::ACTIVE,
            normalization: NormalizationKind::Identity,
            reference_score: DEFAULT_REFERENCE_SCORE,
            max_score: DEFAULT_MAX_SCORE,
            steepness: SIGMOID_STEEPNESS,
            midpoint: SIGMOID_MIDPOINT,
        }
    }
}

impl PowerConfig {
    pub fn normalization(&self) -> Result<Normalization, PowerError> {
        Ok(match self.normalization {
            NormalizationKind::Identity => Normalization::Identity,
            NormalizationKind::Sigmoid => Normalization::Sigmoid(SigmoidNormalizer::with_shape(
                self.reference_score,
                self.max_score,
                self.steepness,
                self.midpoint,
            )?),
        })
    }

    /// Build the configured engine.
    pub fn engine(&self) -> Result<CallingPowerEngine, PowerError> {
        Ok(CallingPowerEngine::from_preset(self.preset).with_normalization(self.normalization()?))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LeagueConfig {
    /// JSON snapshot backing the CLI store.
    pub data_file: PathBuf,
    /// Log level filter string (e.g. "info", "trenches_league=debug").
    pub log_level: String,
    pub log_format: LogFormat,
    pub power: PowerConfig,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        let data_file = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trenches")
            .join("league.json");

        Self {
            data_file,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            power: PowerConfig::default(),
        }
    }
}

impl LeagueConfig {
    /// Load defaults, then the file (if given and present), then the
    /// environment. The power section is validated before returning.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let cfg: LeagueConfig = builder.build()?.try_deserialize()?;
        cfg.power.normalization()?;
        Ok(cfg)
    }
}
