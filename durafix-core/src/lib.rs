//! Durafix Core - WebM duration repair and size-targeted compression
//!
//! This crate provides the building blocks behind the Durafix tools: the
//! EBML duration-field patcher, the size-to-bitrate estimator, rate-control
//! validation, the external encoder adapter and the configuration shared by
//! the web and command-line front ends.

pub mod bitrate;
pub mod compress;
pub mod config;
pub mod duration;
pub mod encoder;
pub mod mode;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use bitrate::{BitrateParams, Quality, RateControl, RateError, estimate};
pub use compress::{CompressRequest, Compressor, RateRequest};
pub use config::DurafixConfig;
pub use duration::{DurationField, FieldEncoding, PatchError, PatchFailure, patch};
pub use encoder::{EncodeSettings, Encoder, EncodingError, FfmpegEncoder, SimulatedEncoder};
pub use mode::RuntimeMode;

/// Core errors that can bubble up from any Durafix subsystem.
///
/// High-level error types representing failures in core functionality.
#[derive(Debug, thiserror::Error)]
pub enum DurafixError {
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Rate control error: {0}")]
    Rate(#[from] RateError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PatchFailure> for DurafixError {
    fn from(failure: PatchFailure) -> Self {
        DurafixError::Patch(failure.error)
    }
}

impl DurafixError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            DurafixError::Patch(e) => match e {
                PatchError::TagNotFound => "Duration tag (0x4489) not found in file".to_string(),
                PatchError::TruncatedHeader => {
                    "File structure invalid - incomplete duration tag".to_string()
                }
                PatchError::TruncatedPayload { .. } => {
                    "File structure invalid - not enough bytes after duration tag".to_string()
                }
                PatchError::UnsupportedSizeDescriptor { byte } => {
                    format!("Unexpected EBML size byte: 0x{byte:02x} (expected 0x88 or 0x84)")
                }
                PatchError::InvalidDuration { .. } => "Invalid duration value".to_string(),
            },
            DurafixError::Rate(e) => e.to_string(),
            DurafixError::Encoding(EncodingError::Timeout { seconds }) => {
                format!("Encoding timed out after {seconds} seconds")
            }
            DurafixError::Encoding(e) => format!("Processing failed: {e}"),
            DurafixError::Configuration { .. } => "Configuration error occurred".to_string(),
            DurafixError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    ///
    /// Malformed or unsupported files count as user errors: they are terminal
    /// for the request and retrying will not help.
    pub fn is_user_error(&self) -> bool {
        matches!(self, DurafixError::Patch(_) | DurafixError::Rate(_))
    }
}

pub type Result<T> = std::result::Result<T, DurafixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_errors_are_user_errors() {
        let error = DurafixError::from(PatchError::TagNotFound);
        assert!(error.is_user_error());
        assert_eq!(error.user_message(), "Duration tag (0x4489) not found in file");
    }

    #[test]
    fn test_size_descriptor_message_includes_byte() {
        let error = DurafixError::from(PatchError::UnsupportedSizeDescriptor { byte: 0x81 });
        assert!(error.user_message().contains("0x81"));
    }

    #[test]
    fn test_encoding_errors_are_not_user_errors() {
        let timeout = DurafixError::from(EncodingError::Timeout { seconds: 300 });
        assert!(!timeout.is_user_error());
        assert_eq!(timeout.user_message(), "Encoding timed out after 300 seconds");

        let failed = DurafixError::from(EncodingError::Failed {
            reason: "exit status 1".to_string(),
        });
        assert!(failed.user_message().starts_with("Processing failed:"));
    }
}
