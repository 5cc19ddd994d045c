use nestx::errors::{ErrorKind, TxError};
use nestx::transaction::{TxContext, NO_TX};
use nestx_int_test::test_util::{
    cleanup, create_test_context, insert_row, read_backup, read_main, run_test,
};

// ==================== Commit Tests ====================

#[test]
fn test_committed_row_visible_via_backup() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;
            assert_ne!(id, NO_TX);

            insert_row(&manager, &tx_ctx, "users", "A", "alice")?;
            // readers see committed state only
            assert_eq!(read_backup(&manager, "users", "A")?, None);

            let mut outcome = Ok(());
            manager.close_tx(&tx_ctx, id, &mut outcome)?;

            assert_eq!(read_backup(&manager, "users", "A")?, Some("alice".into()));
            assert!(manager.auto_handle(&tx_ctx).ptr_eq(&manager.backup_handle()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_transaction_closure_commits() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let count = manager.transaction(&TxContext::new(), |tx_ctx| {
                insert_row(&manager, tx_ctx, "orders", "1", "book")?;
                insert_row(&manager, tx_ctx, "orders", "2", "pen")?;
                Ok(2)
            })?;

            assert_eq!(count, 2);
            assert_eq!(ctx.db().committed_rows("orders")?.len(), 2);
            assert_eq!(ctx.db().stats().committed, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_guard_close_commits() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let guard = manager.begin(&TxContext::new())?;
            insert_row(&manager, guard.context(), "users", "1", "alice")?;
            guard.close()?;

            assert_eq!(read_backup(&manager, "users", "1")?, Some("alice".into()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

// ==================== Rollback Tests ====================

#[test]
fn test_failed_row_absent_from_main_and_backup() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;
            insert_row(&manager, &tx_ctx, "users", "B", "bob")?;
            assert_eq!(read_main(&manager, &tx_ctx, "users", "B")?, Some("bob".into()));

            let mut outcome = Err(TxError::from("validation failed"));
            let err = manager.close_tx(&tx_ctx, id, &mut outcome).unwrap_err();
            assert_eq!(err.message(), "validation failed");

            assert_eq!(read_main(&manager, &TxContext::new(), "users", "B")?, None);
            assert_eq!(read_main(&manager, &tx_ctx, "users", "B")?, None);
            assert_eq!(read_backup(&manager, "users", "B")?, None);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_unique_constraint_failure_rolls_back() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;

            let mut outcome = insert_row(&manager, &tx_ctx, "users", "1", "first")
                .and_then(|_| insert_row(&manager, &tx_ctx, "users", "1", "second"));
            let err = manager.close_tx(&tx_ctx, id, &mut outcome).unwrap_err();

            assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
            assert_eq!(err.to_string(), "UNIQUE constraint failed: users.1");
            assert_eq!(outcome.unwrap_err().to_string(), err.to_string());
            assert!(ctx.db().committed_rows("users")?.is_empty());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_guard_dropped_without_close_rolls_back() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            {
                let guard = manager.begin(&TxContext::new())?;
                insert_row(&manager, guard.context(), "users", "1", "alice")?;
            }

            assert_eq!(read_backup(&manager, "users", "1")?, None);
            assert_eq!(ctx.db().stats().rolled_back, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

// ==================== Collaborator Failure Tests ====================

#[test]
fn test_rollback_failure_keeps_original_outcome() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;
            ctx.db().faults().fail_next_rollback();

            let mut outcome = Err(TxError::from("insert rejected"));
            let err = manager.close_tx(&tx_ctx, id, &mut outcome).unwrap_err();

            assert_eq!(err.kind(), &ErrorKind::RollbackFailure);
            assert_eq!(
                err.message(),
                "main database transaction rollback error: injected rollback failure"
            );
            assert_eq!(err.cause().map(|c| c.message()), Some("insert rejected"));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_commit_failure_is_reported() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            ctx.db().faults().fail_next_commit();

            let err = manager
                .transaction(&TxContext::new(), |tx_ctx| {
                    insert_row(&manager, tx_ctx, "users", "1", "alice")
                })
                .unwrap_err();

            assert_eq!(err.kind(), &ErrorKind::CommitFailure);
            assert_eq!(err.root_cause().message(), "injected commit failure");
            assert_eq!(read_backup(&manager, "users", "1")?, None);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_begin_failure_registers_nothing() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            ctx.db().faults().fail_next_begin();

            let err = manager.open_tx(&TxContext::new()).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::BeginFailure);
            assert_eq!(manager.open_transaction_count(), 0);

            // the fault was one-shot
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;
            manager.close_tx(&tx_ctx, id, &mut Ok(()))?;
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_double_close_reports_already_closed() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (tx_ctx, id) = manager.open_tx(&TxContext::new())?;
            manager.close_tx(&tx_ctx, id, &mut Ok(()))?;

            let err = manager.close_tx(&tx_ctx, id, &mut Ok(())).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::AlreadyClosed);
            assert_eq!(ctx.db().stats().committed, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
