//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading for the post-processor.
//! Configuration is layered from:
//! 1. Built-in defaults (matching the burn rig's usual layout)
//! 2. A TOML file (`config/burn_post.toml` unless another path is given)
//! 3. Environment variables (prefixed with `BURN_POST_`, nested keys split on `__`)
//!
//! # Example
//! ```no_run
//! use burn_post::config::PostConfig;
//!
//! let config = PostConfig::load()?;
//! println!("Data directory: {}", config.layout.data_dir.display());
//! # Ok::<(), burn_post::error::PostError>(())
//! ```

use crate::data::events::EdgeFilter;
use crate::data::summary::RatioPolicy;
use crate::error::{AppResult, PostError};
use crate::tracing_setup::OutputFormat;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/burn_post.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    /// Parallel dataset workers (0 = process datasets one after another)
    pub workers: usize,
    /// Application settings
    pub application: ApplicationConfig,
    /// Where datasets and their files live
    pub layout: LayoutConfig,
    /// Channel names inside the captures
    pub channels: ChannelNames,
    /// Analysis parameters
    pub analysis: AnalysisConfig,
    /// Plot and animation settings
    pub render: RenderConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

/// Dataset directory layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Directory holding one sub-directory per dataset
    pub data_dir: PathBuf,
    /// Results sub-directory created inside each dataset
    pub results_dir: String,
    /// Pre-burn flow capture
    pub pre_file: String,
    /// Post-burn flow capture
    pub post_file: String,
    /// Burn capture
    pub burn_file: String,
}

/// Channel names used by the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelNames {
    /// Fuel gas flow (scfh)
    pub fuel: String,
    /// Oxidizer flow (scfh)
    pub oxidizer: String,
    /// Probe voltage (V)
    pub voltage: String,
    /// Probe current (uA)
    pub current: String,
}

/// Analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Constant-voltage test level (V)
    pub voltage_level: f64,
    /// Constant-current test level (uA)
    pub current_level: f64,
    /// Fuel identifier recorded in the summary
    pub fuel_name: String,
    /// Burn capture metadata key holding the standoff distance
    pub standoff_key: String,
    /// Zero-denominator handling for flow ratios
    pub ratio_policy: RatioPolicy,
    /// Crossing directions reported by the event detector
    pub edge: EdgeFilter,
    /// Analog output channel whose frequency sets the animation frame rate
    pub ao_channel: usize,
}

/// Plot and animation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Voltage axis range of the I-V animation
    pub voltage_range: [f64; 2],
    /// Current axis range of the I-V animation
    pub current_range: [f64; 2],
    /// Animation playback speed relative to real time
    pub playback_speedup: f64,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            application: ApplicationConfig::default(),
            layout: LayoutConfig::default(),
            channels: ChannelNames::default(),
            analysis: AnalysisConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("../data"),
            results_dir: "post1".to_string(),
            pre_file: "pre.dat".to_string(),
            post_file: "post.dat".to_string(),
            burn_file: "burn.dat".to_string(),
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            fuel: "Fuel Gas".to_string(),
            oxidizer: "Oxygen".to_string(),
            voltage: "Voltage".to_string(),
            current: "Current".to_string(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            voltage_level: 2.0,
            current_level: 25.0,
            fuel_name: "CH4".to_string(),
            standoff_key: "standoff_in".to_string(),
            ratio_policy: RatioPolicy::Error,
            edge: EdgeFilter::Any,
            ao_channel: 0,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            voltage_range: [-10.0, 10.0],
            current_range: [-100.0, 250.0],
            playback_speedup: 1.0,
        }
    }
}

impl PostConfig {
    /// Load configuration from the default file and environment variables
    ///
    /// A missing file is not an error; defaults apply.
    /// Environment variables override the file with prefix `BURN_POST_`.
    /// Example: `BURN_POST_ANALYSIS__VOLTAGE_LEVEL=1.5`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Layered provider chain used by [`PostConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(PostConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("BURN_POST_").split("__"))
    }

    /// Render the configuration as TOML, in the layout `load_from` reads.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| PostError::Config(e.to_string()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(PostError::Config(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let names = [
            ("layout.results_dir", &self.layout.results_dir),
            ("layout.pre_file", &self.layout.pre_file),
            ("layout.post_file", &self.layout.post_file),
            ("layout.burn_file", &self.layout.burn_file),
            ("channels.fuel", &self.channels.fuel),
            ("channels.oxidizer", &self.channels.oxidizer),
            ("channels.voltage", &self.channels.voltage),
            ("channels.current", &self.channels.current),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(PostError::Config(format!("{} must not be empty", key)));
            }
        }

        if !self.analysis.voltage_level.is_finite() || !self.analysis.current_level.is_finite() {
            return Err(PostError::Config(
                "analysis levels must be finite numbers".to_string(),
            ));
        }

        if self.render.width < 64 || self.render.height < 48 {
            return Err(PostError::Config(format!(
                "Image size {}x{} is too small (minimum 64x48)",
                self.render.width, self.render.height
            )));
        }

        for (key, [lo, hi]) in [
            ("render.voltage_range", self.render.voltage_range),
            ("render.current_range", self.render.current_range),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(PostError::Config(format!(
                    "{} must be an increasing pair, got [{}, {}]",
                    key, lo, hi
                )));
            }
        }

        if !(self.render.playback_speedup.is_finite() && self.render.playback_speedup > 0.0) {
            return Err(PostError::Config(format!(
                "render.playback_speedup must be positive, got {}",
                self.render.playback_speedup
            )));
        }

        Ok(())
    }
}
