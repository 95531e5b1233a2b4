//! Device communication errors.
//!
//! All of these are transient from the gateway's point of view: they are
//! counted and logged by the caller, never propagated out of a background
//! loop.

use thiserror::Error;

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("request to {address}{path} timed out")]
    Timeout { address: String, path: String },

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("http error: {0}")]
    Http(String),

    #[error("failed to decode response from {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
