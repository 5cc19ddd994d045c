use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, TxError, TxResult};
use crate::handle::{DatabaseHandle, TransactionalHandle};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Faults {
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

/// Observes and steers every handle derived from one base handle.
#[derive(Clone)]
pub(crate) struct HandleProbe {
    events: Atomic<Vec<String>>,
    faults: Arc<Faults>,
}

impl HandleProbe {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.read_with(|events| events.clone())
    }

    pub(crate) fn fail_begin(&self) {
        self.faults.fail_begin.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_commit(&self) {
        self.faults.fail_commit.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_rollback(&self) {
        self.faults.fail_rollback.store(true, Ordering::SeqCst);
    }
}

/// Handle that records begin/commit/rollback calls instead of talking to a database.
pub(crate) struct RecordingHandle {
    name: String,
    in_transaction: bool,
    finished: AtomicBool,
    events: Atomic<Vec<String>>,
    faults: Arc<Faults>,
}

impl RecordingHandle {
    pub(crate) fn new_base(name: &str) -> (DatabaseHandle, HandleProbe) {
        let events = atomic(Vec::new());
        let faults = Arc::new(Faults::default());
        let handle = RecordingHandle {
            name: name.to_string(),
            in_transaction: false,
            finished: AtomicBool::new(false),
            events: events.clone(),
            faults: faults.clone(),
        };
        (DatabaseHandle::new(handle), HandleProbe { events, faults })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, event: &str) {
        let entry = format!("{}:{}", self.name, event);
        self.events.write_with(|events| events.push(entry));
    }

    fn finish(&self, event: &str, fail: &AtomicBool) -> TxResult<()> {
        if !self.in_transaction {
            return Err(TxError::new(
                &format!("{} is not a transaction", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(TxError::new(
                &format!("{} transaction already finished", self.name),
                ErrorKind::InvalidOperation,
            ));
        }
        self.record(event);
        if fail.load(Ordering::SeqCst) {
            return Err(TxError::new(
                &format!("{} refused", event),
                ErrorKind::BackendError,
            ));
        }
        Ok(())
    }
}

impl TransactionalHandle for RecordingHandle {
    fn begin(&self) -> TxResult<DatabaseHandle> {
        if self.faults.fail_begin.load(Ordering::SeqCst) {
            return Err(TxError::new("begin refused", ErrorKind::BackendError));
        }
        self.record("begin");
        Ok(DatabaseHandle::new(RecordingHandle {
            name: self.name.clone(),
            in_transaction: true,
            finished: AtomicBool::new(false),
            events: self.events.clone(),
            faults: self.faults.clone(),
        }))
    }

    fn commit(&self) -> TxResult<()> {
        self.finish("commit", &self.faults.fail_commit)
    }

    fn rollback(&self) -> TxResult<()> {
        self.finish("rollback", &self.faults.fail_rollback)
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
