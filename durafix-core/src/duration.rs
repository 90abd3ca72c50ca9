//! EBML duration field locator and patcher.
//!
//! WebM files produced by browser recorders frequently carry a missing or
//! zero Segment duration. This module finds the `Duration` element (ID
//! `0x4489`) by scanning for its raw two-byte ID and rewrites the float that
//! follows it. No element tree is built: the first occurrence of the ID is
//! treated as authoritative, even when those bytes happen to sit inside
//! unrelated payload.
//!
//! The size descriptor after the ID decides the field layout:
//! - `0x88`: 8-byte big-endian IEEE-754 double
//! - `0x84`: 4-byte big-endian IEEE-754 single
//!
//! The stored value is in seconds; callers supply milliseconds.

use thiserror::Error;

/// Raw EBML ID of the Segment Info `Duration` element.
pub const DURATION_TAG: [u8; 2] = [0x44, 0x89];

/// Size descriptor for an 8-byte float payload.
pub const SIZE_FLOAT64: u8 = 0x88;

/// Size descriptor for a 4-byte float payload.
pub const SIZE_FLOAT32: u8 = 0x84;

/// Errors raised while locating or rewriting the duration field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// Scan completed without finding `0x44 0x89`.
    #[error("Duration tag (0x4489) not found")]
    TagNotFound,

    /// Tag sits at the very end of the buffer with no size descriptor.
    #[error("Duration tag is missing its size descriptor")]
    TruncatedHeader,

    /// Buffer ends before the full float payload.
    #[error("Duration payload truncated: need {width} bytes at offset {offset}, buffer is {len}")]
    TruncatedPayload {
        /// Absolute offset of the payload.
        offset: usize,
        /// Payload width implied by the size descriptor.
        width: usize,
        /// Total buffer length.
        len: usize,
    },

    /// Size descriptor is neither `0x88` nor `0x84`.
    #[error("Unsupported EBML size descriptor 0x{byte:02x}")]
    UnsupportedSizeDescriptor {
        /// The byte found after the tag.
        byte: u8,
    },

    /// Duration is negative, NaN or infinite.
    #[error("Invalid duration: {value} ms")]
    InvalidDuration {
        /// The rejected duration in milliseconds.
        value: f64,
    },
}

/// A failed [`patch`], handing the untouched buffer back to the caller.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PatchFailure {
    /// What went wrong.
    #[source]
    pub error: PatchError,
    /// The input buffer, byte-for-byte unchanged.
    pub buffer: Vec<u8>,
}

/// Numeric layout of the duration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// Big-endian `f64`.
    Float64,
    /// Big-endian `f32`.
    Float32,
}

impl FieldEncoding {
    /// Maps a size descriptor byte to its encoding.
    pub fn from_size_descriptor(byte: u8) -> Option<Self> {
        match byte {
            SIZE_FLOAT64 => Some(Self::Float64),
            SIZE_FLOAT32 => Some(Self::Float32),
            _ => None,
        }
    }

    /// Payload width in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::Float64 => 8,
            Self::Float32 => 4,
        }
    }

    fn encode(self, seconds: f64) -> ([u8; 8], usize) {
        let mut out = [0u8; 8];
        match self {
            Self::Float64 => out.copy_from_slice(&seconds.to_be_bytes()),
            Self::Float32 => out[..4].copy_from_slice(&(seconds as f32).to_be_bytes()),
        }
        (out, self.width())
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_be_bytes(raw)
            }
            Self::Float32 => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                f32::from_be_bytes(raw) as f64
            }
        }
    }
}

impl std::fmt::Display for FieldEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float64 => write!(f, "float64-be"),
            Self::Float32 => write!(f, "float32-be"),
        }
    }
}

/// Location of a validated duration field inside a buffer.
///
/// All offsets are absolute from the start of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationField {
    /// Offset of the `0x44` byte.
    pub tag_offset: usize,
    /// Offset of the first payload byte.
    pub value_offset: usize,
    /// Payload layout.
    pub encoding: FieldEncoding,
}

impl DurationField {
    /// Byte range covered by the payload.
    pub fn value_range(&self) -> std::ops::Range<usize> {
        self.value_offset..self.value_offset + self.encoding.width()
    }
}

/// Finds the first duration tag and validates the field that follows it.
///
/// # Errors
///
/// - `PatchError::TagNotFound` - No `0x44 0x89` sequence in the buffer
/// - `PatchError::TruncatedHeader` - Tag is the last thing in the buffer
/// - `PatchError::UnsupportedSizeDescriptor` - Size byte is not `0x88`/`0x84`
/// - `PatchError::TruncatedPayload` - Buffer ends inside the payload
pub fn locate(buffer: &[u8]) -> Result<DurationField, PatchError> {
    let tag_offset = buffer
        .windows(DURATION_TAG.len())
        .position(|window| window == DURATION_TAG)
        .ok_or(PatchError::TagNotFound)?;

    let size_offset = tag_offset + DURATION_TAG.len();
    let size_byte = *buffer.get(size_offset).ok_or(PatchError::TruncatedHeader)?;

    let encoding = FieldEncoding::from_size_descriptor(size_byte)
        .ok_or(PatchError::UnsupportedSizeDescriptor { byte: size_byte })?;

    let value_offset = size_offset + 1;
    if value_offset + encoding.width() > buffer.len() {
        return Err(PatchError::TruncatedPayload {
            offset: value_offset,
            width: encoding.width(),
            len: buffer.len(),
        });
    }

    tracing::trace!(tag_offset, %encoding, "Located duration field");

    Ok(DurationField {
        tag_offset,
        value_offset,
        encoding,
    })
}

/// Reads the current duration, in milliseconds.
///
/// # Errors
///
/// Same as [`locate`].
pub fn read_duration(buffer: &[u8]) -> Result<f64, PatchError> {
    let field = locate(buffer)?;
    let seconds = field.encoding.decode(&buffer[field.value_range()]);
    Ok(seconds * 1000.0)
}

/// Rewrites the duration field in place.
///
/// Every check runs before the single write, so on error the slice is
/// untouched.
///
/// # Errors
///
/// - Any error from [`locate`]
/// - `PatchError::InvalidDuration` - `duration_ms` is negative or not finite
pub fn patch_in_place(buffer: &mut [u8], duration_ms: f64) -> Result<DurationField, PatchError> {
    let field = locate(buffer)?;

    if !duration_ms.is_finite() || duration_ms < 0.0 {
        return Err(PatchError::InvalidDuration { value: duration_ms });
    }

    let seconds = duration_ms / 1000.0;
    let (encoded, width) = field.encoding.encode(seconds);
    buffer[field.value_range()].copy_from_slice(&encoded[..width]);

    tracing::debug!(
        "Patched duration at offset {} ({}): {:.3}s",
        field.value_offset,
        field.encoding,
        seconds
    );

    Ok(field)
}

/// Patches the duration of an owned buffer.
///
/// Takes the buffer by value and returns it on success. On failure the
/// original bytes come back inside [`PatchFailure`] alongside the typed error.
///
/// # Errors
///
/// See [`patch_in_place`].
pub fn patch(mut buffer: Vec<u8>, duration_ms: f64) -> Result<Vec<u8>, PatchFailure> {
    match patch_in_place(&mut buffer, duration_ms) {
        Ok(_) => Ok(buffer),
        Err(error) => Err(PatchFailure { error, buffer }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_info(size: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x15, 0x49, 0xA9, 0x66];
        data.extend_from_slice(&[0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
        data.extend_from_slice(&DURATION_TAG);
        data.push(size);
        data.extend_from_slice(payload);
        data.extend_from_slice(&[0x4D, 0x80, 0x84, b'D', b'F', b'X', b'1']);
        data
    }

    #[test]
    fn test_locate_float64_field() {
        let data = segment_info(SIZE_FLOAT64, &[0u8; 8]);
        let field = locate(&data).unwrap();

        assert_eq!(field.tag_offset, 15);
        assert_eq!(field.value_offset, 18);
        assert_eq!(field.encoding, FieldEncoding::Float64);
        assert_eq!(field.value_range(), 18..26);
    }

    #[test]
    fn test_patch_writes_seconds_as_double() {
        let data = segment_info(SIZE_FLOAT64, &[0u8; 8]);
        let patched = patch(data.clone(), 3000.0).unwrap();

        assert_eq!(&patched[18..26], &3.0f64.to_be_bytes());
        assert_eq!(&patched[..18], &data[..18]);
        assert_eq!(&patched[26..], &data[26..]);
    }

    #[test]
    fn test_patch_writes_seconds_as_single() {
        let data = segment_info(SIZE_FLOAT32, &[0u8; 4]);
        let patched = patch(data.clone(), 1500.0).unwrap();

        assert_eq!(&patched[18..22], &1.5f32.to_be_bytes());
        assert_eq!(patched.len(), data.len());
        assert_eq!(&patched[22..], &data[22..]);
    }

    #[test]
    fn test_missing_tag_returns_buffer() {
        let data = vec![0x1A, 0x45, 0xDF, 0xA3, 0x44, 0x88, 0x89];
        let failure = patch(data.clone(), 1000.0).unwrap_err();

        assert_eq!(failure.error, PatchError::TagNotFound);
        assert_eq!(failure.buffer, data);
    }

    #[test]
    fn test_empty_buffer_has_no_tag() {
        assert_eq!(locate(&[]).unwrap_err(), PatchError::TagNotFound);
        assert_eq!(locate(&[0x44]).unwrap_err(), PatchError::TagNotFound);
    }

    #[test]
    fn test_tag_at_end_is_truncated_header() {
        let data = vec![0x00, 0x00, 0x44, 0x89];
        assert_eq!(locate(&data).unwrap_err(), PatchError::TruncatedHeader);
    }

    #[test]
    fn test_short_payload_is_truncated() {
        let data = vec![0x44, 0x89, 0x88, 0x40, 0x08];
        assert_eq!(
            locate(&data).unwrap_err(),
            PatchError::TruncatedPayload {
                offset: 3,
                width: 8,
                len: 5
            }
        );
    }

    #[test]
    fn test_short_float32_payload_is_truncated() {
        let data = vec![0x44, 0x89, 0x84, 0x00, 0x00, 0x00];
        let failure = patch(data.clone(), 1000.0).unwrap_err();

        assert_eq!(
            failure.error,
            PatchError::TruncatedPayload {
                offset: 3,
                width: 4,
                len: 6
            }
        );
        assert_eq!(failure.buffer, data);
    }

    #[test]
    fn test_near_miss_bytes_are_not_a_tag() {
        let data = vec![0x89, 0x44, 0x00, 0x44, 0x44, 0x88, 0x44];
        assert_eq!(locate(&data).unwrap_err(), PatchError::TagNotFound);
    }

    #[test]
    fn test_payload_ending_exactly_at_buffer_end() {
        let data = vec![0x44, 0x89, 0x84, 0x00, 0x00, 0x00, 0x00];
        let patched = patch(data, 2000.0).unwrap();
        assert_eq!(&patched[3..], &2.0f32.to_be_bytes());
    }

    #[test]
    fn test_unsupported_size_descriptor() {
        let data = segment_info(0x81, &[0u8; 8]);
        let failure = patch(data.clone(), 1000.0).unwrap_err();

        assert_eq!(
            failure.error,
            PatchError::UnsupportedSizeDescriptor { byte: 0x81 }
        );
        assert_eq!(failure.buffer, data);
    }

    #[test]
    fn test_invalid_duration_leaves_buffer_untouched() {
        let data = segment_info(SIZE_FLOAT64, &[0x11; 8]);

        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let failure = patch(data.clone(), bad).unwrap_err();
            assert!(matches!(failure.error, PatchError::InvalidDuration { .. }));
            assert_eq!(failure.buffer, data);
        }
    }

    #[test]
    fn test_structural_errors_take_precedence_over_duration() {
        let data = vec![0x00, 0x01, 0x02];
        let failure = patch(data, -5.0).unwrap_err();
        assert_eq!(failure.error, PatchError::TagNotFound);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut data = segment_info(SIZE_FLOAT64, &[0u8; 8]);
        data.extend_from_slice(&DURATION_TAG);
        data.push(SIZE_FLOAT64);
        data.extend_from_slice(&[0u8; 8]);

        let tail_start = data.len() - 8;
        let patched = patch(data, 4000.0).unwrap();
        assert_eq!(&patched[18..26], &4.0f64.to_be_bytes());
        assert_eq!(&patched[tail_start..], &[0u8; 8]);
    }

    #[test]
    fn test_read_duration_round_trips_milliseconds() {
        let data = segment_info(SIZE_FLOAT64, &[0u8; 8]);
        let patched = patch(data, 12_500.0).unwrap();
        assert_eq!(read_duration(&patched).unwrap(), 12_500.0);

        let data = segment_info(SIZE_FLOAT32, &[0u8; 4]);
        let patched = patch(data, 2500.0).unwrap();
        assert_eq!(read_duration(&patched).unwrap(), 2500.0);
    }

    #[test]
    fn test_zero_duration_is_allowed() {
        let data = segment_info(SIZE_FLOAT64, &[0xFF; 8]);
        let patched = patch(data, 0.0).unwrap();
        assert_eq!(&patched[18..26], &[0u8; 8]);
    }
}
