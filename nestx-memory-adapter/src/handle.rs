use crate::database::{MemoryDatabaseInner, Table, Tables};
use crate::error::{MemoryError, MemoryResult};
use nestx::common::{ReadExecutor, WriteExecutor};
use nestx::errors::{ErrorKind, TxError, TxResult};
use nestx::handle::{DatabaseHandle, TransactionalHandle};
use parking_lot::Mutex;
use std::any::Any;
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Whether a view may write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

/// A view over a [`crate::MemoryDatabase`], either plain or inside a
/// transaction.
///
/// A plain view autocommits every write. A transaction view reads its own
/// writes from a private snapshot and publishes them on commit.
pub struct MemoryHandle {
    db: Arc<MemoryDatabaseInner>,
    access: AccessMode,
    pending: Option<Mutex<PendingTransaction>>,
}

struct PendingTransaction {
    snapshot: Tables,
    writes: Vec<Write>,
    finished: bool,
}

#[derive(Clone, Debug)]
enum Write {
    Insert {
        table: String,
        key: String,
        value: String,
    },
    Delete {
        table: String,
        key: String,
    },
}

impl MemoryHandle {
    pub(crate) fn base(db: Arc<MemoryDatabaseInner>, access: AccessMode) -> Self {
        MemoryHandle {
            db,
            access,
            pending: None,
        }
    }

    /// Reaches the memory view behind a resolved handle.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InternalError`] if the handle belongs to another adapter.
    pub fn from_handle(handle: &DatabaseHandle) -> TxResult<&MemoryHandle> {
        handle.downcast_ref::<MemoryHandle>().ok_or_else(|| {
            log::error!("Handle {:?} is not a memory database handle", handle);
            TxError::new(
                "handle is not a memory database handle",
                ErrorKind::InternalError,
            )
        })
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    /// Inserts a row; fails if `key` already exists in `table`.
    pub fn insert(&self, table: &str, key: &str, value: &str) -> TxResult<()> {
        self.write(Write::Insert {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }

    /// Deletes a row and reports whether it existed.
    pub fn delete(&self, table: &str, key: &str) -> TxResult<bool> {
        let removed = self.write(Write::Delete {
            table: table.to_string(),
            key: key.to_string(),
        })?;
        Ok(removed)
    }

    pub fn get(&self, table: &str, key: &str) -> TxResult<Option<String>> {
        self.read(|tables| Ok(table_of(tables, table)?.get(key).cloned()))
    }

    pub fn count(&self, table: &str) -> TxResult<usize> {
        self.read(|tables| Ok(table_of(tables, table)?.len()))
    }

    /// Keys of `table` in ascending order.
    pub fn keys(&self, table: &str) -> TxResult<Vec<String>> {
        self.read(|tables| Ok(table_of(tables, table)?.keys().cloned().collect()))
    }

    fn read<R, F>(&self, f: F) -> TxResult<R>
    where
        F: FnOnce(&Tables) -> MemoryResult<R>,
    {
        let result = match &self.pending {
            Some(pending) => {
                let pending = pending.lock();
                if pending.finished {
                    return Err(MemoryError::Finished.into());
                }
                f(&pending.snapshot)
            }
            None => self.db.tables.read_with(f),
        };
        Ok(result?)
    }

    fn write(&self, write: Write) -> MemoryResult<bool> {
        if self.access == AccessMode::ReadOnly {
            return Err(MemoryError::ReadOnly);
        }

        match &self.pending {
            Some(pending) => {
                let mut pending = pending.lock();
                if pending.finished {
                    return Err(MemoryError::Finished);
                }
                let changed = apply(&mut pending.snapshot, &write)?;
                pending.writes.push(write);
                Ok(changed)
            }
            None => self.db.tables.write_with(|tables| apply(tables, &write)),
        }
    }

    /// Marks the transaction finished and hands back its writes.
    fn finish(&self, operation: &'static str) -> MemoryResult<Vec<Write>> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(MemoryError::NotInTransaction(operation))?;
        let mut pending = pending.lock();
        if pending.finished {
            return Err(MemoryError::Finished);
        }
        pending.finished = true;
        pending.snapshot = Tables::new();
        Ok(mem::take(&mut pending.writes))
    }
}

fn table_of<'a>(tables: &'a Tables, table: &str) -> MemoryResult<&'a Table> {
    tables
        .get(table)
        .ok_or_else(|| MemoryError::NoSuchTable(table.to_string()))
}

fn apply(tables: &mut Tables, write: &Write) -> MemoryResult<bool> {
    match write {
        Write::Insert { table, key, value } => {
            let rows = tables
                .get_mut(table.as_str())
                .ok_or_else(|| MemoryError::NoSuchTable(table.clone()))?;
            if rows.contains_key(key.as_str()) {
                return Err(MemoryError::UniqueViolation {
                    table: table.clone(),
                    key: key.clone(),
                });
            }
            rows.insert(key.clone(), value.clone());
            Ok(true)
        }
        Write::Delete { table, key } => {
            let rows = tables
                .get_mut(table.as_str())
                .ok_or_else(|| MemoryError::NoSuchTable(table.clone()))?;
            Ok(rows.remove(key.as_str()).is_some())
        }
    }
}

impl TransactionalHandle for MemoryHandle {
    fn begin(&self) -> TxResult<DatabaseHandle> {
        if self.pending.is_some() {
            return Err(MemoryError::NestedBegin.into());
        }
        self.db.faults.check_begin()?;

        let snapshot = self.db.snapshot();
        self.db.stats.begun.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Began {:?} transaction on {}",
            self.access,
            self.db.config.db_name()
        );
        Ok(DatabaseHandle::new(MemoryHandle {
            db: self.db.clone(),
            access: self.access,
            pending: Some(Mutex::new(PendingTransaction {
                snapshot,
                writes: Vec::new(),
                finished: false,
            })),
        }))
    }

    fn commit(&self) -> TxResult<()> {
        let writes = self.finish("commit")?;
        self.db.faults.check_commit()?;

        // replay onto a copy so a conflict leaves committed state untouched
        self.db.tables.write_with(|tables| -> MemoryResult<()> {
            let mut next = tables.clone();
            for write in &writes {
                apply(&mut next, write)?;
            }
            *tables = next;
            Ok(())
        })?;

        self.db.stats.committed.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Committed {} writes on {}",
            writes.len(),
            self.db.config.db_name()
        );
        Ok(())
    }

    fn rollback(&self) -> TxResult<()> {
        let writes = self.finish("rollback")?;
        self.db.faults.check_rollback()?;

        self.db.stats.rolled_back.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "Rolled back {} writes on {}",
            writes.len(),
            self.db.config.db_name()
        );
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        if let Some(pending) = &self.pending {
            let pending = pending.lock();
            if !pending.finished && !pending.writes.is_empty() {
                log::warn!(
                    "Discarding {} uncommitted writes on {}",
                    pending.writes.len(),
                    self.db.config.db_name()
                );
            }
        }
    }
}
