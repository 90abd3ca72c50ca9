//! CLI command implementations

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use durafix_core::config::DurafixConfig;
use durafix_core::duration::{self, locate, read_duration};
use durafix_core::{CompressRequest, Compressor, DurafixError, RateRequest, RuntimeMode, estimate};
use tokio::fs;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Rewrite the duration field of a WebM file
    Patch {
        /// Input .webm file
        input: PathBuf,
        /// Duration to write, in milliseconds
        #[arg(short, long, default_value_t = 3000.0)]
        duration_ms: f64,
        /// Output path (defaults to <stem>_fixed.webm next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show where the duration field is and what it currently says
    Inspect {
        /// Input .webm file
        input: PathBuf,
    },
    /// Compute encoder bitrates for a target output size
    Estimate {
        /// Desired output size in bytes
        #[arg(long)]
        target_size: u64,
        /// Real playback duration in seconds
        #[arg(long)]
        duration_secs: f64,
        /// Share of the budget held back for container overhead
        #[arg(long)]
        overhead: Option<f64>,
        /// Lowest acceptable video bitrate
        #[arg(long)]
        min_bps: Option<u64>,
    },
    /// Re-encode a WebM file and fix its duration
    Compress(CompressArgs),
    /// Start the upload server
    Server {
        /// Host to bind to
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Encoder backend
        #[arg(long, value_enum, default_value_t = RuntimeMode::Production)]
        mode: RuntimeMode,
    },
}

/// Arguments for `durafix compress`
#[derive(Args)]
pub struct CompressArgs {
    /// Input .webm file
    input: PathBuf,
    /// Real playback duration, in milliseconds
    #[arg(short, long)]
    duration_ms: f64,
    /// Aim for roughly this many output bytes
    #[arg(long, conflicts_with_all = ["crf", "bitrate"])]
    target_size: Option<u64>,
    /// Constant rate factor, 15-35
    #[arg(long, default_value_t = 30, allow_negative_numbers = true)]
    crf: i64,
    /// Bitrate cap, e.g. 500k or 1M
    #[arg(long, default_value = "1M")]
    bitrate: String,
    /// Output path (defaults to <stem>_compressed.webm next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Patch {
            input,
            duration_ms,
            output,
        } => patch_file(&input, duration_ms, output).await,
        Commands::Inspect { input } => inspect_file(&input).await,
        Commands::Estimate {
            target_size,
            duration_secs,
            overhead,
            min_bps,
        } => show_estimate(target_size, duration_secs, overhead, min_bps),
        Commands::Compress(args) => compress_file(args).await,
        Commands::Server { host, port, mode } => start_server(host, port, mode).await,
    }
}

/// Patch a file's duration and write the result
///
/// # Errors
/// - Input cannot be read or output cannot be written
/// - `PatchError` - File has no patchable duration field
pub async fn patch_file(input: &Path, duration_ms: f64, output: Option<PathBuf>) -> anyhow::Result<()> {
    let data = fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let patched = duration::patch(data, duration_ms)
        .map_err(DurafixError::from)
        .with_context(|| format!("Failed to patch {}", input.display()))?;

    let output = output.unwrap_or_else(|| sibling_path(input, "_fixed"));
    fs::write(&output, &patched)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Set duration to {duration_ms} ms: {} -> {}",
        input.display(),
        output.display()
    );
    Ok(())
}

/// Print the duration field location and value
///
/// # Errors
/// - Input cannot be read or has no recognisable duration field
pub async fn inspect_file(input: &Path) -> anyhow::Result<()> {
    let data = fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let field = locate(&data).map_err(DurafixError::from)?;
    let duration_ms = read_duration(&data).map_err(DurafixError::from)?;

    println!("File:      {} ({} bytes)", input.display(), data.len());
    println!("Tag:       0x4489 at offset {}", field.tag_offset);
    println!("Encoding:  {} at offset {}", field.encoding, field.value_offset);
    println!("Duration:  {duration_ms} ms");
    Ok(())
}

/// Print bitrates for a target size
///
/// # Errors
/// - `RateError` - Non-positive duration or invalid overhead
pub fn show_estimate(
    target_size: u64,
    duration_secs: f64,
    overhead: Option<f64>,
    min_bps: Option<u64>,
) -> anyhow::Result<()> {
    let defaults = DurafixConfig::from_env().estimator;
    let params = estimate(
        target_size,
        duration_secs,
        overhead.unwrap_or(defaults.overhead_fraction),
        min_bps.unwrap_or(defaults.min_video_bits_per_sec),
    )
    .map_err(DurafixError::from)?;

    println!("video_bps: {}", params.video_bps);
    println!("maxrate:   {}", params.maxrate);
    println!("bufsize:   {}", params.bufsize);
    Ok(())
}

/// Re-encode a file with ffmpeg and fix its duration
///
/// # Errors
/// - Input cannot be read or output cannot be written
/// - `RateError` - Rejected rate parameters
/// - `EncodingError` - ffmpeg failed or timed out
pub async fn compress_file(args: CompressArgs) -> anyhow::Result<()> {
    let config = DurafixConfig::from_env();
    let encoder = RuntimeMode::Production.build_encoder(&config.encoder);
    anyhow::ensure!(
        encoder.is_available().await,
        "ffmpeg not found at {}",
        config.encoder.ffmpeg_path.display()
    );
    let compressor = Compressor::new(encoder, config.encoder.clone(), config.estimator.clone());

    let data = fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let input_len = data.len();

    let rate = match args.target_size {
        Some(bytes) => RateRequest::TargetSize { bytes },
        None => RateRequest::Manual {
            crf: args.crf,
            bitrate: args.bitrate,
        },
    };
    let request = CompressRequest {
        duration_ms: args.duration_ms,
        rate,
    };

    info!(input = %args.input.display(), bytes = input_len, "Compressing");
    let output = compressor.compress(data, &request).await?;

    let output_path = args
        .output
        .unwrap_or_else(|| sibling_path(&args.input, "_compressed"));
    fs::write(&output_path, &output)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!(
        "Compressed {} ({input_len} bytes) -> {} ({} bytes)",
        args.input.display(),
        output_path.display(),
        output.len()
    );
    Ok(())
}

/// Start the upload server
///
/// # Errors
/// - Listener could not bind
pub async fn start_server(host: Option<IpAddr>, port: Option<u16>, mode: RuntimeMode) -> anyhow::Result<()> {
    let mut config = DurafixConfig::from_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(addr = %config.server.socket_addr(), %mode, "Starting upload server");
    durafix_web::run_server(config, mode).await?;
    Ok(())
}

/// `<dir>/<stem><suffix>.webm` next to `input`.
fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("video");
    input.with_file_name(format!("{stem}{suffix}.webm"))
}
