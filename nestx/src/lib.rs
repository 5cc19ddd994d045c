//! # nestx - Nested Transaction Coordinator
//!
//! `nestx` lets unrelated call sites in a request pipeline share one database
//! transaction without passing transaction handles around. A caller opens a
//! transaction against an immutable [`TxContext`](transaction::TxContext);
//! every frame below that asks the [`TxManager`] for "the" handle gets the
//! open transaction if one is reachable, or a plain handle otherwise.
//!
//! ## Key Features
//!
//! - **Reentrant opens**: opening while a transaction is already reachable
//!   joins it instead of nesting a new physical transaction
//! - **Forced nesting**: `TxOptions::new_transaction()` always begins a fresh
//!   inner transaction that shadows the outer one
//! - **Main/backup routing**: transactional main handle, read replica backup
//!   handle, and `auto_handle` to prefer an in-flight transaction
//! - **Panic safety**: a panic inside a guarded region rolls the transaction
//!   back before the panic continues to the caller
//! - **Concurrency**: one manager serves any number of threads; contexts are
//!   cheap immutable values
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nestx::transaction::TxContext;
//! use nestx::TxManager;
//!
//! let manager = TxManager::new(main_handle, backup_handle);
//!
//! manager.transaction(&TxContext::new(), |ctx| {
//!     // any code reached from here that calls manager.main_handle(ctx)
//!     // gets this transaction
//!     save_order(&manager, ctx)?;
//!     save_invoice(&manager, ctx)
//! })?;
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Shared helpers
//! - [`errors`] - Error types and result definitions
//! - [`handle`] - The database capability adapters implement
//! - [`manager`] - The transaction manager
//! - [`manager_builder`] - Builder for the manager
//! - [`manager_config`] - Manager configuration
//! - [`transaction`] - Ids, registry, context stack, options and guard

pub mod common;
pub mod errors;
pub mod handle;
pub mod manager;
pub mod manager_builder;
pub mod manager_config;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_util;

pub use manager::TxManager;
