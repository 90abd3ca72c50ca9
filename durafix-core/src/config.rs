//! Centralized configuration for Durafix.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Durafix components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct DurafixConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub encoder: EncoderConfig,
    pub estimator: EstimatorConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: IpAddr,
    /// Port to bind
    pub port: u16,
    /// Directory served under `/static` (None = assets bundled with the web crate)
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Upload handling limits and defaults.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    /// Duration applied when the form omits one, in milliseconds
    pub default_duration_ms: f64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024, // 10 MiB
            default_duration_ms: 3000.0,
        }
    }
}

/// External encoder invocation settings.
///
/// Controls which ffmpeg binary runs, how long it may take and how it is
/// tuned for throughput.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// ffmpeg binary, resolved through PATH when relative
    pub ffmpeg_path: PathBuf,
    /// Hard limit on a single encode
    pub timeout: Duration,
    /// Encoder worker threads
    pub threads: usize,
    /// libvpx `-cpu-used` speed preset
    pub cpu_used: u8,
    /// Opus audio bitrate literal
    pub audio_bitrate: String,
    /// Parent directory for staging files (None = system temp dir)
    pub staging_dir: Option<PathBuf>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(300), // 5 minutes
            threads: num_cpus::get().clamp(1, 8),
            cpu_used: 5,
            audio_bitrate: "64k".to_string(),
            staging_dir: None,
        }
    }
}

/// Size-targeted bitrate estimation parameters.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Share of the byte budget held back for container and encoder variance
    pub overhead_fraction: f64,
    /// Lowest video bitrate handed to the encoder
    pub min_video_bits_per_sec: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            overhead_fraction: 0.58,
            min_video_bits_per_sec: 20_000,
        }
    }
}

impl DurafixConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(host) = env_parse::<IpAddr>("DURAFIX_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env_parse::<u16>("DURAFIX_PORT") {
            config.server.port = port;
        }

        if let Ok(dir) = std::env::var("DURAFIX_STATIC_DIR") {
            config.server.static_dir = Some(PathBuf::from(dir));
        }

        if let Some(bytes) = env_parse::<usize>("DURAFIX_MAX_UPLOAD_BYTES") {
            config.upload.max_upload_bytes = bytes;
        }

        if let Ok(path) = std::env::var("DURAFIX_FFMPEG_PATH") {
            config.encoder.ffmpeg_path = PathBuf::from(path);
        }

        if let Some(seconds) = env_parse::<u64>("DURAFIX_ENCODE_TIMEOUT") {
            config.encoder.timeout = Duration::from_secs(seconds);
        }

        if let Some(threads) = env_parse::<usize>("DURAFIX_ENCODER_THREADS") {
            config.encoder.threads = threads.max(1);
        }

        if let Some(overhead) = env_parse::<f64>("DURAFIX_OVERHEAD_FRACTION") {
            if (0.0..1.0).contains(&overhead) {
                config.estimator.overhead_fraction = overhead;
            } else {
                tracing::warn!("Ignoring DURAFIX_OVERHEAD_FRACTION={overhead}: must be in [0, 1)");
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
                static_dir: None,
            },
            encoder: EncoderConfig {
                timeout: Duration::from_secs(5),
                threads: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
