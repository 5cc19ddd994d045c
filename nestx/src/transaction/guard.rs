use super::{TxContext, TxId, NO_TX};
use crate::errors::{ErrorKind, TxError, TxResult};
use crate::manager::TxManager;
use std::mem;
use std::thread;

/// Closes a transaction when it goes out of scope.
///
/// Returned by [`TxManager::begin`]. Pass [`TxGuard::context`] down the call
/// chain, record failures with [`TxGuard::fail`], and finish with
/// [`TxGuard::close`] or [`TxGuard::finish`].
///
/// A guard dropped without being closed never commits:
/// - while the thread unwinds from a panic, the transaction is rolled back
///   as a captured fault and the panic keeps propagating afterwards;
/// - otherwise it is rolled back with the recorded failure, or as
///   abandoned if none was recorded.
///
/// A guard for a reentrant open (id [`NO_TX`]) owns nothing; closing it only
/// hands the recorded outcome back.
pub struct TxGuard {
    manager: TxManager,
    context: TxContext,
    id: TxId,
    outcome: TxResult<()>,
    closed: bool,
}

impl TxGuard {
    pub(crate) fn new(manager: TxManager, context: TxContext, id: TxId) -> Self {
        TxGuard {
            manager,
            context,
            id,
            outcome: Ok(()),
            closed: false,
        }
    }

    /// The context to hand to downstream code.
    pub fn context(&self) -> &TxContext {
        &self.context
    }

    pub fn id(&self) -> TxId {
        self.id
    }

    /// `true` if this guard joined a transaction opened further up the chain.
    pub fn is_reentrant(&self) -> bool {
        self.id == NO_TX
    }

    /// Records a failure; the transaction will be rolled back on close.
    pub fn fail(&mut self, err: TxError) {
        self.outcome = Err(err);
    }

    pub fn outcome(&self) -> &TxResult<()> {
        &self.outcome
    }

    /// Commits, or rolls back if a failure was recorded.
    pub fn close(mut self) -> TxResult<()> {
        self.close_now()
    }

    /// Closes with the outcome of `result` and hands the value back if the
    /// transaction committed.
    pub fn finish<T>(mut self, result: TxResult<T>) -> TxResult<T> {
        if let Err(err) = &result {
            self.outcome = Err(err.clone());
        }
        self.close_now()?;
        result
    }

    fn close_now(&mut self) -> TxResult<()> {
        self.closed = true;
        let mut outcome = mem::replace(&mut self.outcome, Ok(()));
        self.manager.close_tx(&self.context, self.id, &mut outcome)
    }
}

impl Drop for TxGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        if self.id != NO_TX && self.outcome.is_ok() && !thread::panicking() {
            log::warn!(
                "Transaction {} dropped without being closed, rolling back",
                self.id
            );
            self.outcome = Err(TxError::new(
                "transaction guard dropped without being closed",
                ErrorKind::Abandoned,
            ));
        }

        if let Err(err) = self.close_now() {
            match err.kind() {
                ErrorKind::RollbackFailure | ErrorKind::CommitFailure | ErrorKind::AlreadyClosed => {
                    log::error!("Failed to close transaction {} on drop: {}", self.id, err)
                }
                _ => log::debug!("Transaction {} closed on drop: {}", self.id, err),
            }
        }
    }
}
