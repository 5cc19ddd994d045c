//! In-memory database adapter for `nestx`.
//!
//! [`MemoryDatabase`] is a small keyed-table store with snapshot-isolated
//! transactions, a read-write and a read-only routing view, unique-key
//! enforcement and one-shot fault injection. It gives the coordinator a real
//! backend to drive in tests and examples without any external service.

mod config;
mod database;
mod error;
mod handle;

pub use config::*;
pub use database::{FaultInjector, MemoryDatabase, MemoryStats};
pub use error::*;
pub use handle::*;
