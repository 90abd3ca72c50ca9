//! Response shaping: JSON errors and WebM attachments

use std::path::Path;
use std::sync::LazyLock;

use axum::extract::multipart::MultipartError;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use durafix_core::{DurafixError, EncodingError};
use regex::Regex;
use serde_json::json;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("filename pattern is valid"));

/// Error returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    /// Response status code
    pub status: StatusCode,
    /// Human-readable message placed in the body
    pub message: String,
}

impl ApiError {
    /// A 400 response for invalid client input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<DurafixError> for ApiError {
    fn from(error: DurafixError) -> Self {
        let status = if error.is_user_error() {
            StatusCode::BAD_REQUEST
        } else if matches!(error, DurafixError::Encoding(EncodingError::Timeout { .. })) {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            status,
            message: error.user_message(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        let status = error.status();
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "File too large".to_string()
        } else {
            format!("Malformed upload: {}", error.body_text())
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed with {}: {}", self.status, self.message);
        } else {
            tracing::warn!("Request rejected with {}: {}", self.status, self.message);
        }

        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Reduces an uploaded file name to a safe ASCII name.
///
/// Path separators and whitespace become underscores, anything outside
/// `[A-Za-z0-9_.-]` is dropped and leading/trailing dots and underscores are
/// trimmed. Returns `None` if nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Download name for a processed upload, e.g. `clip.webm` -> `clip_fixed.webm`.
pub fn download_name(original: &str, suffix: &str) -> String {
    let safe = sanitize_filename(original).unwrap_or_else(|| "video".to_string());
    let stem = Path::new(&safe)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("video");
    format!("{stem}{suffix}.webm")
}

/// Wraps processed bytes as a `video/webm` download.
pub fn webm_attachment(data: Vec<u8>, file_name: &str) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "video/webm".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        ),
    ];
    (StatusCode::OK, headers, data).into_response()
}
