//! Integration tests for the ffmpeg process adapter.
//!
//! A shell script stands in for ffmpeg so the spawn, exit-status, timeout
//! and staging cleanup paths run without a real encoder installed.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use durafix_core::bitrate::RateControl;
use durafix_core::config::EncoderConfig;
use durafix_core::encoder::{EncodeSettings, Encoder, EncodingError, FfmpegEncoder};
use tempfile::TempDir;
use tokio::sync::{Mutex, MutexGuard};

/// Exec'ing a freshly written script fails with ETXTBSY if another test
/// forks while the write handle is open, so these tests run one at a time.
static SERIAL: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().await
}

/// Test fixture owning a fake ffmpeg binary and a staging root.
struct FakeFfmpeg {
    _bin_dir: TempDir,
    staging_root: TempDir,
    config: EncoderConfig,
}

impl FakeFfmpeg {
    /// Installs a fake ffmpeg whose body is `script`.
    fn new(script: &str, timeout: Duration) -> Self {
        let bin_dir = TempDir::new().unwrap();
        let staging_root = TempDir::new().unwrap();
        let binary = write_script(bin_dir.path(), script);

        let config = EncoderConfig {
            ffmpeg_path: binary,
            timeout,
            threads: 1,
            staging_dir: Some(staging_root.path().to_path_buf()),
            ..EncoderConfig::default()
        };

        Self {
            _bin_dir: bin_dir,
            staging_root,
            config,
        }
    }

    fn encoder(&self) -> FfmpegEncoder {
        FfmpegEncoder::new(&self.config)
    }

    fn settings(&self) -> EncodeSettings {
        EncodeSettings::new(RateControl::manual(30, "500k").unwrap(), &self.config)
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging_root.path())
            .unwrap()
            .next()
            .is_none()
    }
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let staged = dir.join("ffmpeg.partial");
    std::fs::write(&staged, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = dir.join("ffmpeg");
    std::fs::rename(&staged, &path).unwrap();
    path
}

/// Copies the `-i` input to the final argument, like a lossless remux.
const COPY_SCRIPT: &str = r#"
if [ "$1" = "-version" ]; then echo "ffmpeg version fake"; exit 0; fi
input=""
output=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-i" ]; then shift; input="$1"; fi
  output="$1"
  shift
done
cp "$input" "$output"
"#;

#[tokio::test]
async fn test_successful_encode_returns_output_and_cleans_up() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new(COPY_SCRIPT, Duration::from_secs(10));
    let encoder = fake.encoder();

    assert!(encoder.is_available().await);

    let output = encoder
        .encode(b"webm-bytes", &fake.settings())
        .await
        .unwrap();

    assert_eq!(output, b"webm-bytes");
    assert!(fake.staging_is_empty());
}

#[tokio::test]
async fn test_non_zero_exit_is_failure_with_stderr() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new(
        "echo \"Unknown encoder 'libvpx-vp9'\" >&2\nexit 1",
        Duration::from_secs(10),
    );

    let result = fake.encoder().encode(b"webm-bytes", &fake.settings()).await;

    match result {
        Err(EncodingError::Failed { reason }) => {
            assert!(reason.contains("Unknown encoder"), "reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(fake.staging_is_empty());
}

#[tokio::test]
async fn test_slow_encoder_times_out_and_cleans_up() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new("sleep 5", Duration::from_millis(200));

    let started = Instant::now();
    let result = fake.encoder().encode(b"webm-bytes", &fake.settings()).await;

    assert!(matches!(result, Err(EncodingError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(fake.staging_is_empty());
}

#[tokio::test]
async fn test_empty_output_is_failure() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new(
        r#"for last; do :; done
: > "$last""#,
        Duration::from_secs(10),
    );

    let result = fake.encoder().encode(b"webm-bytes", &fake.settings()).await;
    assert!(matches!(result, Err(EncodingError::Failed { .. })));
    assert!(fake.staging_is_empty());
}

#[tokio::test]
async fn test_availability_probe_does_not_block_runtime() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new("sleep 2", Duration::from_secs(10));
    let encoder = fake.encoder();

    let probe = tokio::spawn(async move { encoder.is_available().await });

    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "runtime stalled for {:?}",
        started.elapsed()
    );

    assert!(probe.await.unwrap());
}

#[tokio::test]
async fn test_hung_binary_is_reported_unavailable() {
    let _serial = serial().await;
    let fake = FakeFfmpeg::new("sleep 5", Duration::from_millis(200));

    let started = Instant::now();
    assert!(!fake.encoder().is_available().await);
    assert!(started.elapsed() < Duration::from_secs(4));
}
