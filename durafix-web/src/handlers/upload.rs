//! Upload handlers: duration repair and size-targeted compression

use axum::extract::{Multipart, State};
use axum::response::Response;
use durafix_core::{CompressRequest, DurafixError, RateRequest, duration};

use super::form::UploadForm;
use super::response::{ApiError, download_name, webm_attachment};
use crate::server::AppState;

/// CRF used when a manual compress request omits one.
const DEFAULT_CRF: &str = "30";

/// Bitrate cap used when a manual compress request omits one.
const DEFAULT_BITRATE: &str = "1M";

/// `POST /upload` - rewrite the duration field and return the file.
///
/// # Errors
///
/// - `400` - Bad form input or the file has no patchable duration field
/// - `413` - Upload too large
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let duration_ms = form.duration_ms(state.config.upload.default_duration_ms)?;

    let patched = duration::patch(form.data, duration_ms).map_err(DurafixError::from)?;

    tracing::info!(
        "Patched '{}' to {:.0} ms ({} bytes)",
        form.file_name,
        duration_ms,
        patched.len()
    );

    Ok(webm_attachment(
        patched,
        &download_name(&form.file_name, "_fixed"),
    ))
}

/// `POST /compress` - re-encode, then rewrite the duration field.
///
/// Uses `target_size` (bytes) when present, otherwise `crf` and `bitrate`.
///
/// # Errors
///
/// - `400` - Bad form input, rejected rate parameters, or unpatchable output
/// - `413` - Upload too large
/// - `500` - Encoder failed
/// - `504` - Encoder timed out
pub async fn compress_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let duration_ms = form.duration_ms(state.config.upload.default_duration_ms)?;
    let rate = rate_request(&form)?;

    let request = CompressRequest { duration_ms, rate };
    tracing::info!("Compressing '{}' with {:?}", form.file_name, request);

    let file_name = download_name(&form.file_name, "_compressed");
    let output = state.compressor.compress(form.data, &request).await?;

    Ok(webm_attachment(output, &file_name))
}

fn rate_request(form: &UploadForm) -> Result<RateRequest, ApiError> {
    if let Some(raw) = form.field("target_size") {
        let bytes = raw
            .parse::<u64>()
            .map_err(|_| ApiError::bad_request("Invalid target size"))?;
        return Ok(RateRequest::TargetSize { bytes });
    }

    let crf = form
        .field("crf")
        .unwrap_or(DEFAULT_CRF)
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request("Invalid quality value"))?;
    let bitrate = form.field("bitrate").unwrap_or(DEFAULT_BITRATE).to_string();

    Ok(RateRequest::Manual { crf, bitrate })
}
