// crates/client/src/lib.rs
//! Warehouse client layer: the `Warehouse` trait, the GCP-backed
//! implementation, an in-memory fake for tests, and the job watcher that
//! turns server-side jobs into single-resolution outcomes.

mod error;
pub mod fake;
mod gcp;
mod warehouse;
mod watcher;

pub use error::{WarehouseError, WatchError};
pub use gcp::GcpWarehouse;
pub use warehouse::Warehouse;
pub use watcher::{JobTicket, JobWatcher};
