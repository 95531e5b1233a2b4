//! rigwatch-device — gateway-side clients for talking to rigs.
//!
//! # Architecture
//!
//! ```text
//! DeviceApi (trait)          CameraStreamer (trait)       Reachability (trait)
//!   └── HttpDeviceApi          └── TcpCameraStreamer        └── SystemReachability
//!         └── http::call()           ├── frame codec              ├── ping(8)
//!                                    ├── disk writer              └── TCP connect
//!                                    └── StreamProgress
//! ```
//!
//! The traits are the seams the orchestrator, poller and restart
//! coordinator are written against; tests substitute in-process fakes.

pub mod api;
pub mod error;
pub mod http;
pub mod network;
pub mod stream;

pub use api::{DeviceApi, HttpDeviceApi};
pub use error::{DeviceError, DeviceResult};
pub use network::{Reachability, SystemReachability, ip_range};
pub use stream::{CameraStreamer, FrameNotice, StreamProgress, StreamSession, TcpCameraStreamer};
