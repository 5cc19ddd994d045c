//! Transaction lifecycle and propagation
//!
//! Id generation, the registry of open transactions, the immutable context
//! stack that carries ids down a call chain, and the guard that closes a
//! transaction on scope exit.

mod context;
mod guard;
mod id_generator;
mod options;
mod registry;

pub use context::TxContext;
pub use guard::TxGuard;
pub use id_generator::{TxId, TxIdGenerator, DEFAULT_ID_HIGH_WATER_MARK, NO_TX};
pub use options::TxOptions;
pub use registry::{TransactionRecord, TransactionRegistry};
