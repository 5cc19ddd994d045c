use nestx::errors::{ErrorKind, TxError, TxResult};
use nestx::transaction::TxContext;
use nestx::TxManager;
use nestx_memory_adapter::{MemoryConfig, MemoryDatabase, MemoryHandle};
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Runs a test between a setup and a teardown step.
///
/// `after` runs even when the test body fails, so leak checks in the
/// teardown still report.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> TxResult<()>,
    B: Fn() -> TxResult<TestContext>,
    A: Fn(TestContext) -> TxResult<()>,
{
    let start_time = Instant::now();
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| test(ctx.clone())));
    let after_result = after(ctx);

    match result {
        Ok(Ok(())) => {
            if let Err(e) = after_result {
                panic!("After run failed: {:?}", e);
            }
        }
        Ok(Err(e)) => {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("Failed after {:?}", start_time.elapsed());
            eprintln!("Error: {:?}", e);
            let bt = Backtrace::capture().to_string();
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            eprintln!("=====================================================\n");
            panic!("Test failed: {}", e);
        }
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[derive(Clone)]
pub struct TestContext {
    db: MemoryDatabase,
    manager: TxManager,
}

impl TestContext {
    pub fn new(db: MemoryDatabase, manager: TxManager) -> Self {
        Self { db, manager }
    }

    pub fn db(&self) -> MemoryDatabase {
        self.db.clone()
    }

    pub fn manager(&self) -> TxManager {
        self.manager.clone()
    }
}

pub fn create_test_context() -> TxResult<TestContext> {
    let db = MemoryDatabase::open(
        MemoryConfig::new()
            .name("int-test")
            .table("users")
            .table("orders"),
    );
    let manager = TxManager::builder().routing(&db).build()?;
    Ok(TestContext::new(db, manager))
}

/// Fails if the test left transactions open on the manager.
pub fn cleanup(ctx: TestContext) -> TxResult<()> {
    let leaked = ctx.manager().active_transactions();
    if !leaked.is_empty() {
        log::error!("Leaked open transactions: {:?}", leaked);
        return Err(TxError::new(
            &format!("{} transactions left open: {:?}", leaked.len(), leaked),
            ErrorKind::InternalError,
        ));
    }
    Ok(())
}

/// Inserts through whatever main handle `ctx` resolves to.
pub fn insert_row(
    manager: &TxManager,
    ctx: &TxContext,
    table: &str,
    key: &str,
    value: &str,
) -> TxResult<()> {
    let handle = manager.main_handle(ctx);
    MemoryHandle::from_handle(&handle)?.insert(table, key, value)
}

/// Reads through the main handle `ctx` resolves to.
pub fn read_main(
    manager: &TxManager,
    ctx: &TxContext,
    table: &str,
    key: &str,
) -> TxResult<Option<String>> {
    let handle = manager.main_handle(ctx);
    MemoryHandle::from_handle(&handle)?.get(table, key)
}

/// Reads committed state through the backup handle.
pub fn read_backup(manager: &TxManager, table: &str, key: &str) -> TxResult<Option<String>> {
    let handle = manager.backup_handle();
    MemoryHandle::from_handle(&handle)?.get(table, key)
}
