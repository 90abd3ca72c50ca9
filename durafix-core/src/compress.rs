//! Compression pipeline: rate control, encode, then duration repair.
//!
//! Browser-recorded WebM re-encoded by ffmpeg still needs its duration
//! rewritten, so every successful encode is followed by a duration patch on
//! the encoder output.

use std::sync::Arc;

use crate::bitrate::{RateControl, estimate};
use crate::config::{EncoderConfig, EstimatorConfig};
use crate::duration::{self, PatchError};
use crate::encoder::{EncodeSettings, Encoder};
use crate::{DurafixError, Result};

/// How the caller wants the output rate chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum RateRequest {
    /// Aim for an output of roughly this many bytes.
    TargetSize { bytes: u64 },
    /// Explicit CRF plus bitrate literal, validated but not computed.
    Manual { crf: i64, bitrate: String },
}

/// A single compression job.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressRequest {
    /// Real playback duration in milliseconds, written into the output.
    pub duration_ms: f64,
    pub rate: RateRequest,
}

/// Runs compression jobs against a shared encoder.
#[derive(Clone)]
pub struct Compressor {
    encoder: Arc<dyn Encoder>,
    encoder_config: EncoderConfig,
    estimator: EstimatorConfig,
}

impl Compressor {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        encoder_config: EncoderConfig,
        estimator: EstimatorConfig,
    ) -> Self {
        Self {
            encoder,
            encoder_config,
            estimator,
        }
    }

    /// Whether the underlying encoder can run.
    pub async fn encoder_available(&self) -> bool {
        self.encoder.is_available().await
    }

    /// Resolves a rate request into encoder rate control.
    ///
    /// # Errors
    ///
    /// - `DurafixError::Patch` - `duration_ms` is negative or not finite
    /// - `DurafixError::Rate` - Estimation or manual validation failed
    pub fn resolve_rate(&self, request: &CompressRequest) -> Result<RateControl> {
        if !request.duration_ms.is_finite() || request.duration_ms < 0.0 {
            return Err(PatchError::InvalidDuration {
                value: request.duration_ms,
            }
            .into());
        }

        let rate_control = match &request.rate {
            RateRequest::TargetSize { bytes } => RateControl::Estimated(estimate(
                *bytes,
                request.duration_ms / 1000.0,
                self.estimator.overhead_fraction,
                self.estimator.min_video_bits_per_sec,
            )?),
            RateRequest::Manual { crf, bitrate } => RateControl::manual(*crf, bitrate)?,
        };

        Ok(rate_control)
    }

    /// Re-encodes `input` and stamps `duration_ms` into the result.
    ///
    /// # Errors
    ///
    /// - `DurafixError::Patch` - Invalid duration, or encoder output has no usable duration field
    /// - `DurafixError::Rate` - Rate request rejected
    /// - `DurafixError::Encoding` - Encoder failed or timed out
    pub async fn compress(&self, input: Vec<u8>, request: &CompressRequest) -> Result<Vec<u8>> {
        let rate_control = self.resolve_rate(request)?;
        let settings = EncodeSettings::new(rate_control, &self.encoder_config);

        let encoded = self.encoder.encode(&input, &settings).await?;
        drop(input);

        let patched = duration::patch(encoded, request.duration_ms).map_err(|failure| {
            tracing::warn!("Encoder output could not be patched: {}", failure.error);
            DurafixError::from(failure)
        })?;

        tracing::info!(
            "Compressed to {} bytes with duration {:.0} ms",
            patched.len(),
            request.duration_ms
        );

        Ok(patched)
    }
}
