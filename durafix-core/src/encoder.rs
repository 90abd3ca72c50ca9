//! Encoder abstraction for both production and simulation modes
//!
//! Production encoding shells out to `ffmpeg` and produces VP9/Opus WebM.
//! Input and output are staged in a private temporary directory that is
//! removed on every exit path, and the process is killed if it outlives the
//! configured timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::bitrate::RateControl;
use crate::config::EncoderConfig;

/// Characters of ffmpeg stderr kept in failure reasons.
const STDERR_TAIL_CHARS: usize = 2000;

/// Upper bound on the `ffmpeg -version` availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors reported by the encoder collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("Encoder failed: {reason}")]
    Failed { reason: String },

    #[error("Encoder timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Per-invocation encoder parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    /// Bitrate or CRF selection.
    pub rate_control: RateControl,
    /// Encoder worker threads.
    pub threads: usize,
    /// libvpx speed preset, higher is faster.
    pub cpu_used: u8,
    /// Opus audio bitrate literal.
    pub audio_bitrate: String,
}

impl EncodeSettings {
    /// Combines a rate-control choice with the configured tuning knobs.
    pub fn new(rate_control: RateControl, config: &EncoderConfig) -> Self {
        Self {
            rate_control,
            threads: config.threads,
            cpu_used: config.cpu_used,
            audio_bitrate: config.audio_bitrate.clone(),
        }
    }

    /// Full ffmpeg argument list for one input/output pair.
    pub fn ffmpeg_args(&self, input_path: &Path, output_path: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(input_path.display().to_string());

        args.extend(
            ["-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p"]
                .into_iter()
                .map(String::from),
        );
        args.extend(self.rate_control.ffmpeg_args());

        args.extend(["-c:a", "libopus", "-b:a"].into_iter().map(String::from));
        args.push(self.audio_bitrate.clone());

        args.push("-threads".to_string());
        args.push(self.threads.to_string());
        args.extend(
            ["-row-mt", "1", "-deadline", "realtime", "-cpu-used"]
                .into_iter()
                .map(String::from),
        );
        args.push(self.cpu_used.to_string());

        args.push("-f".to_string());
        args.push("webm".to_string());
        args.push(output_path.display().to_string());
        args
    }
}

/// Something that turns an input container into a re-encoded WebM.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Re-encode `input` and return the produced bytes.
    ///
    /// # Errors
    /// - `EncodingError::Failed` - Encoder could not run or exited non-zero
    /// - `EncodingError::Timeout` - Encoder exceeded its time budget
    /// - `EncodingError::Io` - Staging files could not be written or read
    async fn encode(&self, input: &[u8], settings: &EncodeSettings)
    -> Result<Vec<u8>, EncodingError>;

    /// Check if the encoder is installed and runnable.
    async fn is_available(&self) -> bool;
}

/// Production encoder driving an external `ffmpeg` binary.
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
    staging_dir: Option<PathBuf>,
}

impl FfmpegEncoder {
    /// Create encoder from configuration.
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: config.timeout,
            staging_dir: config.staging_dir.clone(),
        }
    }

    fn create_staging(&self) -> Result<tempfile::TempDir, EncodingError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("durafix-");
        match &self.staging_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| EncodingError::Io {
            operation: "create staging directory",
            source,
        })
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &[u8],
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, EncodingError> {
        let start_time = Instant::now();

        // Dropping `staging` removes both files, whichever way we leave.
        let staging = self.create_staging()?;
        let input_path = staging.path().join("input.webm");
        let output_path = staging.path().join("output.webm");

        tokio::fs::write(&input_path, input)
            .await
            .map_err(|source| EncodingError::Io {
                operation: "write encoder input",
                source,
            })?;

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(settings.ffmpeg_args(&input_path, &output_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            "Starting ffmpeg encode: {} bytes, rate control {:?}",
            input.len(),
            settings.rate_control
        );
        tracing::debug!("Executing ffmpeg command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| {
            tracing::error!("Failed to execute ffmpeg: {}", e);
            EncodingError::Failed {
                reason: format!("Failed to execute ffmpeg: {e}"),
            }
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| EncodingError::Io {
                operation: "wait for ffmpeg",
                source,
            })?,
            Err(_) => {
                tracing::warn!("ffmpeg exceeded {:?}, killing process", self.timeout);
                return Err(EncodingError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr_tail(&stderr);
            tracing::error!("ffmpeg failed with {}: {}", output.status, tail);
            return Err(EncodingError::Failed {
                reason: format!("ffmpeg exited with {}: {tail}", output.status),
            });
        }

        let encoded = tokio::fs::read(&output_path)
            .await
            .map_err(|source| EncodingError::Io {
                operation: "read encoder output",
                source,
            })?;

        if encoded.is_empty() {
            return Err(EncodingError::Failed {
                reason: "ffmpeg produced an empty file".to_string(),
            });
        }

        tracing::info!(
            "Encoded {} -> {} bytes in {:.2}s",
            input.len(),
            encoded.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(encoded)
    }

    async fn is_available(&self) -> bool {
        let probe = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(PROBE_TIMEOUT.min(self.timeout), probe).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::debug!("ffmpeg probe failed to start: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!("ffmpeg -version did not answer within {:?}", PROBE_TIMEOUT);
                false
            }
        }
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim_end();
    if trimmed.len() <= STDERR_TAIL_CHARS {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_CHARS;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

/// Scripted outcome for [`SimulatedEncoder`].
#[derive(Debug, Clone)]
enum SimulatedOutcome {
    Passthrough,
    Fail(String),
    Timeout(u64),
}

/// In-process encoder for development mode and tests.
///
/// Returns its input untouched unless scripted to fail.
pub struct SimulatedEncoder {
    outcome: SimulatedOutcome,
    is_available: bool,
    calls: AtomicUsize,
}

impl SimulatedEncoder {
    /// Create new passthrough encoder.
    pub fn new() -> Self {
        Self {
            outcome: SimulatedOutcome::Passthrough,
            is_available: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call with the given reason.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.outcome = SimulatedOutcome::Fail(reason.into());
        self
    }

    /// Report a timeout on every call.
    pub fn timing_out(mut self, seconds: u64) -> Self {
        self.outcome = SimulatedOutcome::Timeout(seconds);
        self
    }

    /// Simulate the encoder being unavailable.
    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }

    /// Number of encode calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Encoder for SimulatedEncoder {
    async fn encode(
        &self,
        input: &[u8],
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, EncodingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Simulated encode with {:?}", settings.rate_control);

        match &self.outcome {
            SimulatedOutcome::Passthrough => Ok(input.to_vec()),
            SimulatedOutcome::Fail(reason) => Err(EncodingError::Failed {
                reason: reason.clone(),
            }),
            SimulatedOutcome::Timeout(seconds) => Err(EncodingError::Timeout { seconds: *seconds }),
        }
    }

    async fn is_available(&self) -> bool {
        self.is_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitrate::{RateControl, estimate};

    fn test_settings() -> EncodeSettings {
        EncodeSettings {
            rate_control: RateControl::manual(30, "500k").unwrap(),
            threads: 2,
            cpu_used: 5,
            audio_bitrate: "64k".to_string(),
        }
    }

    #[test]
    fn test_ffmpeg_args_layout() {
        let args = test_settings().ffmpeg_args(Path::new("/tmp/in.webm"), Path::new("/tmp/out.webm"));

        assert_eq!(&args[..5], ["-hide_banner", "-nostdin", "-y", "-i", "/tmp/in.webm"]);
        assert_eq!(args.last().unwrap(), "/tmp/out.webm");

        let joined = args.join(" ");
        assert!(joined.contains("-c:v libvpx-vp9 -pix_fmt yuv420p -crf 30 -b:v 500k"));
        assert!(joined.contains("-c:a libopus -b:a 64k"));
        assert!(joined.contains("-threads 2 -row-mt 1 -deadline realtime -cpu-used 5"));
        assert!(joined.contains("-f webm"));
    }

    #[test]
    fn test_ffmpeg_args_estimated_mode() {
        let mut settings = test_settings();
        settings.rate_control = RateControl::Estimated(estimate(256_000, 3.0, 0.58, 20_000).unwrap());

        let joined = settings
            .ffmpeg_args(Path::new("in"), Path::new("out"))
            .join(" ");
        assert!(joined.contains("-b:v 286720 -maxrate 286720 -bufsize 430080"));
        assert!(!joined.contains("-crf"));
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = format!("{}END", "x".repeat(STDERR_TAIL_CHARS * 2));
        let tail = stderr_tail(&long);
        assert_eq!(tail.len(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
        assert_eq!(stderr_tail("short\n"), "short");
    }

    #[tokio::test]
    async fn test_simulated_encoder_outcomes() {
        let settings = test_settings();

        let passthrough = SimulatedEncoder::new();
        assert_eq!(passthrough.encode(b"abc", &settings).await.unwrap(), b"abc");
        assert_eq!(passthrough.calls(), 1);

        let failing = SimulatedEncoder::new().failing("boom");
        assert!(matches!(
            failing.encode(b"abc", &settings).await,
            Err(EncodingError::Failed { reason }) if reason == "boom"
        ));

        let slow = SimulatedEncoder::new().timing_out(300);
        assert!(matches!(
            slow.encode(b"abc", &settings).await,
            Err(EncodingError::Timeout { seconds: 300 })
        ));

        assert!(!SimulatedEncoder::new().unavailable().is_available().await);
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported_as_failure() {
        let config = EncoderConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/durafix-ffmpeg"),
            ..EncoderConfig::default()
        };
        let encoder = FfmpegEncoder::new(&config);

        assert!(!encoder.is_available().await);
        assert!(matches!(
            encoder.encode(b"abc", &test_settings()).await,
            Err(EncodingError::Failed { .. })
        ));
    }
}
