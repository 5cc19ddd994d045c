use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::handle::{AccessMode, MemoryHandle};
use nestx::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use nestx::errors::TxResult;
use nestx::handle::{DatabaseHandle, RoutingPool};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type Table = im::OrdMap<String, String>;
pub(crate) type Tables = im::HashMap<String, Table>;

/// In-memory database with snapshot-isolated transactions.
///
/// One `MemoryDatabase` plays the role of a connection pool: it hands out a
/// read-write view ([`MemoryDatabase::writer`]) and a read-only view
/// ([`MemoryDatabase::reader`]) over the same committed state, which is what
/// [`nestx::TxManager::with_routing`] binds to the main and backup roles.
///
/// Committed state lives in persistent maps, so beginning a transaction
/// takes an O(1) snapshot. Writes inside a transaction go to the snapshot
/// and are replayed onto the committed state on commit; a replay conflict
/// (for example two transactions inserting the same key) fails the commit.
///
/// # Examples
///
/// ```rust
/// use nestx::TxManager;
/// use nestx::transaction::TxContext;
/// use nestx_memory_adapter::{MemoryConfig, MemoryDatabase, MemoryHandle};
///
/// let db = MemoryDatabase::open(MemoryConfig::new().table("users"));
/// let manager = TxManager::with_routing(&db);
///
/// manager
///     .transaction(&TxContext::new(), |ctx| {
///         MemoryHandle::from_handle(&manager.main_handle(ctx))?.insert("users", "1", "alice")
///     })
///     .unwrap();
///
/// let backup = manager.backup_handle();
/// let reader = MemoryHandle::from_handle(&backup).unwrap();
/// assert_eq!(reader.get("users", "1").unwrap(), Some("alice".to_string()));
/// ```
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<MemoryDatabaseInner>,
    writer: DatabaseHandle,
    reader: DatabaseHandle,
}

impl MemoryDatabase {
    /// Opens a fresh database with the tables named in `config`.
    pub fn open(config: MemoryConfig) -> MemoryDatabase {
        let inner = Arc::new(MemoryDatabaseInner::new(config));
        log::debug!(
            "Opened in-memory database {} with {} tables",
            inner.config.db_name(),
            inner.config.tables().len()
        );
        MemoryDatabase {
            writer: DatabaseHandle::new(MemoryHandle::base(inner.clone(), AccessMode::ReadWrite)),
            reader: DatabaseHandle::new(MemoryHandle::base(inner.clone(), AccessMode::ReadOnly)),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.config.db_name()
    }

    /// Creates a table; creating an existing table is a no-op.
    pub fn create_table(&self, table: &str) {
        self.inner.tables.write_with(|tables| {
            tables.entry(table.to_string()).or_insert_with(Table::new);
        });
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.inner.tables.read_with(|tables| tables.contains_key(table))
    }

    /// Committed rows of `table`, ordered by key.
    pub fn committed_rows(&self, table: &str) -> TxResult<Vec<(String, String)>> {
        let rows = self.inner.tables.read_with(|tables| {
            tables
                .get(table)
                .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .ok_or_else(|| MemoryError::NoSuchTable(table.to_string()))
        })?;
        Ok(rows)
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.inner.faults
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner.stats.snapshot()
    }
}

impl RoutingPool for MemoryDatabase {
    fn writer(&self) -> DatabaseHandle {
        self.writer.clone()
    }

    fn reader(&self) -> DatabaseHandle {
        self.reader.clone()
    }
}

pub(crate) struct MemoryDatabaseInner {
    pub(crate) config: MemoryConfig,
    pub(crate) tables: Atomic<Tables>,
    pub(crate) faults: FaultInjector,
    pub(crate) stats: StatCounters,
}

impl MemoryDatabaseInner {
    fn new(config: MemoryConfig) -> Self {
        let tables: Tables = config
            .tables()
            .iter()
            .map(|name| (name.clone(), Table::new()))
            .collect();
        MemoryDatabaseInner {
            config,
            tables: atomic(tables),
            faults: FaultInjector::default(),
            stats: StatCounters::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> Tables {
        self.tables.read_with(|tables| tables.clone())
    }
}

/// One-shot failure switches for begin, commit and rollback.
///
/// Each switch fails exactly the next call of its kind and then resets.
#[derive(Default)]
pub struct FaultInjector {
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
}

impl FaultInjector {
    pub fn fail_next_begin(&self) {
        self.begin.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_commit(&self) {
        self.commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_rollback(&self) {
        self.rollback.store(true, Ordering::SeqCst);
    }

    pub(crate) fn check_begin(&self) -> MemoryResult<()> {
        Self::check(&self.begin, "begin")
    }

    pub(crate) fn check_commit(&self) -> MemoryResult<()> {
        Self::check(&self.commit, "commit")
    }

    pub(crate) fn check_rollback(&self) -> MemoryResult<()> {
        Self::check(&self.rollback, "rollback")
    }

    fn check(switch: &AtomicBool, operation: &'static str) -> MemoryResult<()> {
        if switch.swap(false, Ordering::SeqCst) {
            log::warn!("Injecting {} failure", operation);
            return Err(MemoryError::Injected(operation));
        }
        Ok(())
    }
}

/// Counts of transaction lifecycle events since the database was opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

#[derive(Default)]
pub(crate) struct StatCounters {
    pub(crate) begun: AtomicU64,
    pub(crate) committed: AtomicU64,
    pub(crate) rolled_back: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> MemoryStats {
        MemoryStats {
            begun: self.begun.load(Ordering::SeqCst),
            committed: self.committed.load(Ordering::SeqCst),
            rolled_back: self.rolled_back.load(Ordering::SeqCst),
        }
    }
}
