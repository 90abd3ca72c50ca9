//! Index page and health endpoint

use axum::extract::State;
use axum::response::{Html, Json};
use serde::Serialize;

use crate::server::AppState;

/// Health report for monitoring.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `"ok"` while the server answers
    pub status: &'static str,
    /// Whether `/compress` can reach its encoder
    pub encoder_available: bool,
    /// Runtime mode
    pub mode: durafix_core::RuntimeMode,
    /// Seconds since start
    pub uptime_secs: u64,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        encoder_available: state.compressor.encoder_available().await,
        mode: state.mode,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// `GET /` - upload forms for both endpoints.
pub async fn index_page(State(state): State<AppState>) -> Html<String> {
    let default_duration = state.config.upload.default_duration_ms;
    let max_bytes = state.config.upload.max_upload_bytes;
    let max_mb = max_bytes / (1024 * 1024);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Durafix - WebM duration fixer</title>
  <style>
    body {{ font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }}
    fieldset {{ margin-bottom: 1.5rem; }}
    label {{ display: block; margin: 0.5rem 0; }}
    .status {{ padding: 0.5rem; border-radius: 4px; }}
    .status.error {{ background: #fdecea; }}
    .status.success {{ background: #e8f5e9; }}
  </style>
</head>
<body>
  <h1>Durafix</h1>
  <p>Set the duration of a <code>.webm</code> recording (max {max_mb} MB).</p>

  <p id="status" class="status" hidden></p>

  <form action="/upload" method="post" enctype="multipart/form-data" data-suffix="_fixed" data-max-bytes="{max_bytes}" data-busy="Fixing duration...">
    <fieldset>
      <legend>Fix duration</legend>
      <label>File <input type="file" name="file" accept=".webm" required></label>
      <label>Duration (ms) <input type="number" name="duration" min="0" step="any" value="{default_duration}"></label>
      <button type="submit">Fix</button>
    </fieldset>
  </form>

  <form action="/compress" method="post" enctype="multipart/form-data" data-suffix="_compressed" data-max-bytes="{max_bytes}" data-busy="Compressing, this may take a few minutes...">
    <fieldset>
      <legend>Compress and fix</legend>
      <label>File <input type="file" name="file" accept=".webm" required></label>
      <label>Duration (ms) <input type="number" name="duration" min="0" step="any" value="{default_duration}"></label>
      <label>Target size (bytes, optional) <input type="number" name="target_size" min="1"></label>
      <label>Quality (CRF 15-35) <input type="number" name="crf" min="15" max="35" value="30"></label>
      <label>Bitrate <input type="text" name="bitrate" value="1M" pattern="[0-9]+[kKM]?" title="Digits with an optional k or M suffix"></label>
      <button type="submit">Compress</button>
    </fieldset>
  </form>

  <script src="/static/durafix.js"></script>
</body>
</html>
"#
    ))
}
