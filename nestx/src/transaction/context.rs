use super::TxId;
use im::Vector;

/// Immutable execution context threaded through a call chain.
///
/// Holds the ids of the transactions opened by ancestor frames, most recent
/// first. Contexts are values: deriving a new one never changes the one it
/// was derived from, and clones share structure, so passing a context into a
/// worker thread is cheap and needs no synchronization.
///
/// A context can also be marked *non-transactional*; handle resolution then
/// reports "no transaction" no matter what the stack holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxContext {
    tx_ids: Vector<TxId>,
    non_tx: bool,
}

impl TxContext {
    /// An empty context: no transactions, transactional resolution enabled.
    pub fn new() -> Self {
        TxContext::default()
    }

    /// Returns a new context with `id` in front of the stack.
    pub fn with_tx_id(&self, id: TxId) -> TxContext {
        let mut tx_ids = self.tx_ids.clone();
        tx_ids.push_front(id);
        TxContext {
            tx_ids,
            non_tx: self.non_tx,
        }
    }

    /// Returns a copy of this context marked non-transactional.
    pub fn non_tx(&self) -> TxContext {
        TxContext {
            tx_ids: self.tx_ids.clone(),
            non_tx: true,
        }
    }

    pub fn is_non_tx(&self) -> bool {
        self.non_tx
    }

    /// Ids from the innermost (most recently opened) to the outermost.
    pub fn tx_ids(&self) -> impl Iterator<Item = TxId> + '_ {
        self.tx_ids.iter().copied()
    }

    /// The most recently opened id, if any.
    pub fn innermost(&self) -> Option<TxId> {
        self.tx_ids.front().copied()
    }

    pub fn depth(&self) -> usize {
        self.tx_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_ids.is_empty()
    }
}
