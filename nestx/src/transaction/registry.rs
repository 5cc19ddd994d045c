use super::TxId;
use crate::handle::{DatabaseHandle, DatabaseRole};
use dashmap::DashMap;

/// An open transaction as tracked by the registry.
///
/// `database` is the base handle the transaction was begun on and
/// `transaction` is the handle `begin` returned.
#[derive(Clone, Debug)]
pub struct TransactionRecord {
    role: DatabaseRole,
    database: DatabaseHandle,
    transaction: DatabaseHandle,
}

impl TransactionRecord {
    pub fn new(role: DatabaseRole, database: DatabaseHandle, transaction: DatabaseHandle) -> Self {
        TransactionRecord {
            role,
            database,
            transaction,
        }
    }

    pub fn role(&self) -> DatabaseRole {
        self.role
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.database
    }

    pub fn transaction(&self) -> &DatabaseHandle {
        &self.transaction
    }
}

/// Concurrent map of open transactions keyed by id.
///
/// Backed by a sharded `DashMap`, so unrelated call chains storing and
/// removing different ids never contend on a global lock. Records are cloned
/// out on `load`; no shard guard escapes this type.
#[derive(Default)]
pub struct TransactionRegistry {
    records: DashMap<TxId, TransactionRecord>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        TransactionRegistry {
            records: DashMap::new(),
        }
    }

    pub fn store(&self, id: TxId, record: TransactionRecord) {
        self.records.insert(id, record);
    }

    pub fn load(&self, id: TxId) -> Option<TransactionRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Removes and returns the record. Of two racing removers of the same id,
    /// exactly one gets `Some`.
    pub fn remove(&self, id: TxId) -> Option<TransactionRecord> {
        self.records.remove(&id).map(|(_, record)| record)
    }

    pub fn contains(&self, id: TxId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of the ids open at the time of the call, in ascending order.
    pub fn ids(&self) -> Vec<TxId> {
        let mut ids: Vec<TxId> = self.records.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}
