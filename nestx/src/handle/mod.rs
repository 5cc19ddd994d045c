//! The database capability the coordinator drives but never implements.
//!
//! Adapters implement [`TransactionalHandle`] for their client type; the
//! coordinator only ever sees [`DatabaseHandle`], a shared pointer over the
//! trait object.

mod role;

pub use role::*;

use crate::errors::TxResult;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::Arc;

/// Contract for a database client the coordinator can open transactions on.
///
/// A base (non-transactional) handle and a begun transaction handle have the
/// same type; only the way they were produced differs.
///
/// # Contract
/// - `begin` starts a genuinely new transaction on every call and returns a
///   handle scoped to it.
/// - `commit` and `rollback` are terminal: a transaction handle accepts exactly
///   one of them. Calling either on a base handle is an adapter error.
/// - Implementations must be `Send + Sync`; the same handle is used from many
///   threads at once.
pub trait TransactionalHandle: Send + Sync {
    /// Starts a new transaction scoped to this handle.
    fn begin(&self) -> TxResult<DatabaseHandle>;

    /// Commits the transaction this handle represents.
    fn commit(&self) -> TxResult<()>;

    /// Rolls back the transaction this handle represents.
    fn rollback(&self) -> TxResult<()>;

    /// Returns `true` if the handle was produced by `begin`.
    fn in_transaction(&self) -> bool;

    /// Lets application code reach the concrete adapter type to run queries.
    fn as_any(&self) -> &dyn Any;
}

/// Cheaply clonable shared handle to a database or an open transaction.
///
/// Identity matters: two `DatabaseHandle`s are "the same handle" when they
/// point at the same adapter instance, see [`DatabaseHandle::ptr_eq`].
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<dyn TransactionalHandle>,
}

impl DatabaseHandle {
    /// Wraps an adapter implementation.
    pub fn new<T: TransactionalHandle + 'static>(inner: T) -> Self {
        DatabaseHandle {
            inner: Arc::new(inner),
        }
    }

    /// Returns `true` if both handles point at the same adapter instance.
    pub fn ptr_eq(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the concrete adapter type, if it is `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl Deref for DatabaseHandle {
    type Target = Arc<dyn TransactionalHandle>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for DatabaseHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("ptr", &Arc::as_ptr(&self.inner).cast::<()>())
            .field("in_transaction", &self.inner.in_transaction())
            .finish()
    }
}

/// A single connection pool that can hand out read-write and read-only
/// routing views of itself.
///
/// Used by [`crate::TxManager::with_routing`] to bind the main role to the
/// writer view and the backup role to the reader view.
pub trait RoutingPool {
    /// The read-write view; bound to [`DatabaseRole::Main`].
    fn writer(&self) -> DatabaseHandle;

    /// The read-only view; bound to [`DatabaseRole::Backup`].
    fn reader(&self) -> DatabaseHandle;
}
