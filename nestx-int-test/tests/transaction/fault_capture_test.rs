use nestx::common::panic_message;
use nestx::errors::TxResult;
use nestx::transaction::TxContext;
use nestx_int_test::test_util::{cleanup, create_test_context, insert_row, read_backup, run_test};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

#[test]
fn test_panic_rolls_back_then_propagates() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let db = ctx.db();

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                manager.transaction(&TxContext::new(), |tx_ctx| -> TxResult<()> {
                    insert_row(&manager, tx_ctx, "users", "1", "alice")?;
                    panic!("handler exploded");
                })
            }));

            let payload = result.unwrap_err();
            assert_eq!(panic_message(payload.as_ref()), "handler exploded");
            assert_eq!(read_backup(&manager, "users", "1")?, None);
            assert_eq!(db.stats().rolled_back, 1);
            assert_eq!(manager.open_transaction_count(), 0);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_guard_rolls_back_while_unwinding() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();

            let result = panic::catch_unwind(AssertUnwindSafe(|| -> TxResult<()> {
                let guard = manager.begin(&TxContext::new())?;
                insert_row(&manager, guard.context(), "orders", "1", "book")?;
                panic!("worker crashed");
            }));

            assert!(result.is_err());
            assert!(ctx.db().committed_rows("orders")?.is_empty());
            assert_eq!(ctx.db().stats().rolled_back, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_panicking_worker_thread_rolls_back() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let worker = {
                let manager = manager.clone();
                thread::spawn(move || {
                    let _ = manager.transaction(&TxContext::new(), |tx_ctx| -> TxResult<()> {
                        insert_row(&manager, tx_ctx, "users", "1", "alice")?;
                        panic!("thread failed");
                    });
                })
            };

            let payload = worker.join().unwrap_err();
            assert_eq!(panic_message(payload.as_ref()), "thread failed");
            assert_eq!(read_backup(&manager, "users", "1")?, None);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
#[should_panic(expected = "transaction not open")]
fn test_require_main_tx_outside_transaction_panics() {
    let ctx = create_test_context().unwrap();
    ctx.manager().require_main_tx(&TxContext::new());
}
