//! Runtime mode configuration for Durafix.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::encoder::{Encoder, FfmpegEncoder, SimulatedEncoder};

/// Runtime mode for Durafix services.
///
/// Controls whether compression runs a real ffmpeg process or the in-process
/// simulated encoder. Duration patching behaves identically in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Production mode - encodes with the external ffmpeg binary
    #[default]
    Production,
    /// Development mode - simulated encoder, no ffmpeg required
    Development,
}

impl RuntimeMode {
    /// Check if running in development mode.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Builds the encoder matching this mode.
    pub fn build_encoder(self, config: &EncoderConfig) -> Arc<dyn Encoder> {
        match self {
            Self::Production => Arc::new(FfmpegEncoder::new(config)),
            Self::Development => Arc::new(SimulatedEncoder::new()),
        }
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "PRODUCTION"),
            Self::Development => write!(f, "DEVELOPMENT"),
        }
    }
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            _ => Err(format!(
                "Invalid runtime mode: '{s}'. Valid options are: production, development"
            )),
        }
    }
}
