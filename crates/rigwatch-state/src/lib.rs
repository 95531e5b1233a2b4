//! rigwatch-state — durable gateway state.
//!
//! Backed by [redb](https://docs.rs/redb). Tours, trips, audit events,
//! movement plans, outlet wiring, temperature samples and the seen-device
//! log are JSON-serialized into `&[u8]` value columns under `&str` keys.
//! Child records use `{tour_id:020}:{seq:020}` keys so a prefix scan yields
//! them in insertion order.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod events;
pub mod keys;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use events::EventLog;
pub use store::StateStore;
