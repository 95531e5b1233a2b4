//! Camera stream frame codec.
//!
//! Every frame a device streams carries the motor step it was tagged with,
//! the capture time, and for thermal frames the raw sensor temperature:
//!
//! ```text
//! offset  size  field
//! 0       4     step index       (i32, little-endian)
//! 4       8     capture ticks    (i64, 100ns units since 0001-01-01)
//! 12      4     raw temperature  (i32, centi-kelvin, thermal only)
//! 16      ..    payload          (jpeg / raw thermal bytes)
//! ```
//!
//! A frame consisting solely of `0xFF` bytes marks the normal end of a stream.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Size of the fixed frame header.
pub const HEADER_LEN: usize = 16;

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_MS: i64 = 10_000;

/// Date layout used in stored frame file names.
pub const FILE_DATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S-%3f";

/// The two camera streams a rig provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    Visible,
    Thermal,
}

impl CameraKind {
    /// Extension of stored frame files.
    pub fn file_ending(self) -> &'static str {
        match self {
            CameraKind::Visible => ".jpg",
            CameraKind::Thermal => ".rawir",
        }
    }

    /// Path segment of the device REST controller for this camera.
    pub fn api_segment(self) -> &'static str {
        match self {
            CameraKind::Visible => "visimagetaking",
            CameraKind::Thermal => "irimagetaking",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CameraKind::Visible => "vis",
            CameraKind::Thermal => "ir",
        }
    }
}

impl std::fmt::Display for CameraKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamFrame {
    pub step_index: i32,
    pub capture_ticks: i64,
    pub raw_temperature: i32,
    pub payload: Option<Vec<u8>>,
}

impl StreamFrame {
    /// Build a frame stamped with a Unix millisecond capture time.
    pub fn new(step_index: i32, capture_unix_ms: i64, raw_temperature: i32, payload: Vec<u8>) -> Self {
        Self {
            step_index,
            capture_ticks: unix_ms_to_ticks(capture_unix_ms),
            raw_temperature,
            payload: Some(payload),
        }
    }

    /// Decode a frame. Missing header fields decode as zero.
    pub fn decode(bytes: &[u8]) -> Self {
        let step_index = bytes
            .get(0..4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or_default();
        let capture_ticks = bytes
            .get(4..12)
            .and_then(|b| <[u8; 8]>::try_from(b).ok())
            .map(i64::from_le_bytes)
            .unwrap_or_default();
        let raw_temperature = bytes
            .get(12..16)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .unwrap_or_default();
        let payload = (bytes.len() > HEADER_LEN).then(|| bytes[HEADER_LEN..].to_vec());
        Self {
            step_index,
            capture_ticks,
            raw_temperature,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload.as_deref().unwrap_or_default();
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&self.step_index.to_le_bytes());
        out.extend_from_slice(&self.capture_ticks.to_le_bytes());
        out.extend_from_slice(&self.raw_temperature.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// The end-of-stream marker.
    pub fn sentinel() -> Vec<u8> {
        vec![0xFF; HEADER_LEN]
    }

    /// Whether raw bytes are the end-of-stream marker.
    pub fn is_sentinel(bytes: &[u8]) -> bool {
        !bytes.is_empty() && bytes.iter().all(|b| *b == 0xFF)
    }

    pub fn capture_unix_ms(&self) -> i64 {
        ticks_to_unix_ms(self.capture_ticks)
    }

    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Sensor temperature in degrees Celsius, if the frame carries one.
    pub fn temperature_celsius(&self) -> Option<f32> {
        (self.raw_temperature != 0).then(|| (self.raw_temperature as f32 - 27315.0) / 100.0)
    }

    /// File name under which this frame is stored on disk.
    pub fn file_name(&self, camera: CameraKind) -> String {
        let stamp = DateTime::from_timestamp_millis(self.capture_unix_ms())
            .map(|t| t.format(FILE_DATE_FORMAT).to_string())
            .unwrap_or_else(|| "0001-01-01 00-00-00-000".to_string());
        format!(
            "{stamp}_{}_{}{}",
            self.step_index,
            self.raw_temperature,
            camera.file_ending()
        )
    }
}

/// Ticks come straight off the wire; out-of-range values saturate.
pub fn ticks_to_unix_ms(ticks: i64) -> i64 {
    ticks.saturating_sub(UNIX_EPOCH_TICKS) / TICKS_PER_MS
}

pub fn unix_ms_to_ticks(unix_ms: i64) -> i64 {
    unix_ms
        .saturating_mul(TICKS_PER_MS)
        .saturating_add(UNIX_EPOCH_TICKS)
}
