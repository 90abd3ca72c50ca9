//! Size-targeted bitrate estimation and manual rate-control validation.
//!
//! Estimated mode turns a desired output size and the real playback duration
//! into a VP9 bitrate plus the `-maxrate`/`-bufsize` companions the encoder
//! needs. Manual mode only validates what the caller supplied.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Lower bound on the usable bit budget, in bits.
pub const USABLE_BITS_FLOOR: f64 = 8_000.0;

/// Accepted CRF values for manual mode.
pub const QUALITY_RANGE: RangeInclusive<u8> = 15..=35;

/// Rate-control validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("Invalid duration: {value} seconds (must be greater than zero)")]
    InvalidDuration { value: f64 },

    #[error("Quality {value} out of range (must be between 15 and 35)")]
    QualityOutOfRange { value: i64 },

    #[error("Invalid overhead fraction: {value} (must be in [0, 1))")]
    InvalidOverhead { value: f64 },

    #[error("Invalid bitrate: '{value}'")]
    InvalidBitrate { value: String },
}

/// Encoder rate-control values derived from a target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateParams {
    /// Target video bitrate in bits per second.
    pub video_bps: u64,
    /// Peak bitrate, equal to the target.
    pub maxrate: u64,
    /// Rate-control buffer size, 1.5x the target.
    pub bufsize: u64,
}

/// Derives encoder bitrates from a target file size.
///
/// `overhead_fraction` of the byte budget is held back for container and
/// encoder variance. The remaining bits are spread over `duration_seconds`
/// and floored at `min_video_bits_per_sec`.
///
/// # Errors
///
/// - `RateError::InvalidDuration` - `duration_seconds` is not a positive finite number
/// - `RateError::InvalidOverhead` - `overhead_fraction` outside `[0, 1)`
pub fn estimate(
    target_size_bytes: u64,
    duration_seconds: f64,
    overhead_fraction: f64,
    min_video_bits_per_sec: u64,
) -> Result<BitrateParams, RateError> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(RateError::InvalidDuration {
            value: duration_seconds,
        });
    }
    if !overhead_fraction.is_finite() || !(0.0..1.0).contains(&overhead_fraction) {
        return Err(RateError::InvalidOverhead {
            value: overhead_fraction,
        });
    }

    let target_bits = target_size_bytes.max(1) as f64 * 8.0;
    let usable_bits = (target_bits * (1.0 - overhead_fraction)).max(USABLE_BITS_FLOOR);
    let video_bps = ((usable_bits / duration_seconds).floor() as u64).max(min_video_bits_per_sec);

    let params = BitrateParams {
        video_bps,
        maxrate: video_bps,
        bufsize: (video_bps as f64 * 1.5).round() as u64,
    };

    tracing::debug!(
        target_size_bytes,
        duration_seconds,
        video_bps = params.video_bps,
        "Estimated bitrate"
    );

    Ok(params)
}

/// A validated constant rate factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Validates a CRF value against [`QUALITY_RANGE`].
    ///
    /// # Errors
    ///
    /// - `RateError::QualityOutOfRange` - Value below 15 or above 35
    pub fn new(value: i64) -> Result<Self, RateError> {
        u8::try_from(value)
            .ok()
            .filter(|crf| QUALITY_RANGE.contains(crf))
            .map(Self)
            .ok_or(RateError::QualityOutOfRange { value })
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates a manual bitrate literal such as `500k`, `1M` or `800000`.
///
/// Returns the trimmed literal as ffmpeg expects it. Lowercase `m` is
/// rejected because ffmpeg reads it as milli, not mega.
///
/// # Errors
///
/// - `RateError::InvalidBitrate` - Empty, zero, or not digits with an optional `k`/`K`/`M` suffix
pub fn validate_bitrate(value: &str) -> Result<String, RateError> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_suffix(['k', 'K', 'M'])
        .unwrap_or(trimmed);

    let valid = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && digits.bytes().any(|b| b != b'0');

    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(RateError::InvalidBitrate {
            value: value.to_string(),
        })
    }
}

/// How the encoder should control its output rate.
#[derive(Debug, Clone, PartialEq)]
pub enum RateControl {
    /// Bitrate derived from a target size.
    Estimated(BitrateParams),
    /// Caller-chosen CRF with a bitrate cap.
    Manual { quality: Quality, bitrate: String },
}

impl RateControl {
    /// Builds manual rate control from raw inputs.
    ///
    /// # Errors
    ///
    /// - `RateError::QualityOutOfRange` - CRF outside `[15, 35]`
    /// - `RateError::InvalidBitrate` - Unparsable bitrate literal
    pub fn manual(crf: i64, bitrate: &str) -> Result<Self, RateError> {
        Ok(Self::Manual {
            quality: Quality::new(crf)?,
            bitrate: validate_bitrate(bitrate)?,
        })
    }

    /// Encoder arguments for this rate-control mode.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        match self {
            Self::Estimated(params) => vec![
                "-b:v".to_string(),
                params.video_bps.to_string(),
                "-maxrate".to_string(),
                params.maxrate.to_string(),
                "-bufsize".to_string(),
                params.bufsize.to_string(),
            ],
            Self::Manual { quality, bitrate } => vec![
                "-crf".to_string(),
                quality.to_string(),
                "-b:v".to_string(),
                bitrate.clone(),
            ],
        }
    }
}
