//! rigwatch-health — which devices exist and what they can do.
//!
//! ```text
//! DeviceProber ──candidates──▶ HealthPoller ──publish──▶ HealthRegistry
//!   ping + TCP on the            GET health per ip          snapshot (watch)
//!   configured ip range          retry counters             seen-device log
//!                                eviction + ping check      evictions
//! ```
//!
//! The registry snapshot is replaced whole on every poll cycle; readers
//! never see a mix of two cycles. A device that fails
//! `eviction_threshold` consecutive polls and then fails a final ping is
//! dropped entirely and has to be rediscovered by the prober.

pub mod poller;
pub mod prober;
pub mod registry;

pub use poller::HealthPoller;
pub use prober::DeviceProber;
pub use registry::HealthRegistry;
