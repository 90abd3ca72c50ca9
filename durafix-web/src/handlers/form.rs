//! Multipart upload form extraction

use std::collections::HashMap;

use axum::extract::Multipart;

use super::response::ApiError;

/// A `.webm` upload plus its accompanying text fields.
#[derive(Debug)]
pub struct UploadForm {
    /// Client-supplied file name, unsanitised
    pub file_name: String,
    /// Raw file contents
    pub data: Vec<u8>,
    /// Remaining text fields by name
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Reads every multipart field, keeping the `file` part as bytes.
    ///
    /// # Errors
    ///
    /// - `400` - No `file` part, empty file name, or a non-`.webm` file name
    /// - `413` - Body exceeded the configured upload limit
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut file: Option<(String, Vec<u8>)> = None;
        let mut fields = HashMap::new();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                file = Some((file_name, data.to_vec()));
            } else {
                let value = field.text().await?;
                fields.insert(name, value);
            }
        }

        let Some((file_name, data)) = file else {
            return Err(ApiError::bad_request("No file uploaded"));
        };
        if file_name.trim().is_empty() {
            return Err(ApiError::bad_request("No file selected"));
        }
        if !file_name.to_lowercase().ends_with(".webm") {
            return Err(ApiError::bad_request("Only .webm files are supported"));
        }

        tracing::debug!("Received upload '{}' ({} bytes)", file_name, data.len());

        Ok(Self {
            file_name,
            data,
            fields,
        })
    }

    /// Non-empty text field, trimmed.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Duration in milliseconds, falling back to `default_ms`.
    ///
    /// Negative and non-finite values parse here and are rejected by the patcher.
    ///
    /// # Errors
    ///
    /// - `400` - Field present but not a number
    pub fn duration_ms(&self, default_ms: f64) -> Result<f64, ApiError> {
        match self.field("duration") {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| ApiError::bad_request("Invalid duration value")),
            None => Ok(default_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with(fields: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            file_name: "clip.webm".to_string(),
            data: Vec::new(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_duration_defaults_when_missing_or_blank() {
        assert_eq!(form_with(&[]).duration_ms(3000.0).unwrap(), 3000.0);
        assert_eq!(form_with(&[("duration", "  ")]).duration_ms(3000.0).unwrap(), 3000.0);
    }

    #[test]
    fn test_duration_parses_number() {
        let form = form_with(&[("duration", " 12500.5 ")]);
        assert_eq!(form.duration_ms(3000.0).unwrap(), 12500.5);
    }

    #[test]
    fn test_duration_rejects_text() {
        let error = form_with(&[("duration", "three seconds")])
            .duration_ms(3000.0)
            .unwrap_err();
        assert_eq!(error.message, "Invalid duration value");
    }
}
