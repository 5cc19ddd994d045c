use nestx::errors::{ErrorKind, TxError, TxResult};
use nestx::handle::DatabaseRole;
use nestx::transaction::{TxContext, TxOptions, NO_TX};
use nestx_int_test::test_util::{
    cleanup, create_test_context, insert_row, read_backup, read_main, run_test,
};
use nestx_memory_adapter::MemoryHandle;

// ==================== Reentrant Opens ====================

#[test]
fn test_reentrant_open_joins_outer_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (outer_ctx, outer_id) = manager.open_tx(&TxContext::new())?;
            insert_row(&manager, &outer_ctx, "users", "1", "alice")?;

            let (inner_ctx, inner_id) = manager.open_tx(&outer_ctx)?;
            assert_eq!(inner_id, NO_TX);
            assert_eq!(inner_ctx, outer_ctx);
            insert_row(&manager, &inner_ctx, "users", "2", "bob")?;

            // closing the joined level neither commits nor rolls back
            let mut outcome = Err(TxError::from("inner step failed"));
            let err = manager.close_tx(&inner_ctx, inner_id, &mut outcome).unwrap_err();
            assert_eq!(err.message(), "inner step failed");
            assert_eq!(read_main(&manager, &outer_ctx, "users", "2")?, Some("bob".into()));
            assert_eq!(ctx.db().stats().begun, 1);

            manager.close_tx(&outer_ctx, outer_id, &mut Ok(()))?;
            assert_eq!(ctx.db().committed_rows("users")?.len(), 2);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_nested_closures_share_one_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let result: TxResult<()> = manager.transaction(&TxContext::new(), |outer| {
                insert_row(&manager, outer, "orders", "1", "book")?;
                manager.transaction(outer, |inner| {
                    insert_row(&manager, inner, "users", "1", "alice")
                })?;
                Err(TxError::from("payment declined"))
            });

            assert_eq!(result.unwrap_err().message(), "payment declined");
            assert!(ctx.db().committed_rows("orders")?.is_empty());
            assert!(ctx.db().committed_rows("users")?.is_empty());
            assert_eq!(ctx.db().stats().begun, 1);
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

// ==================== Forced Nesting ====================

#[test]
fn test_forced_inner_transaction_is_independent() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let (outer_ctx, outer_id) = manager.open_tx(&TxContext::new())?;
            insert_row(&manager, &outer_ctx, "orders", "A", "outer")?;

            let (inner_ctx, inner_id) =
                manager.open_tx_with_options(&outer_ctx, TxOptions::new_transaction())?;
            assert_ne!(inner_id, NO_TX);
            assert_ne!(inner_id, outer_id);
            assert_eq!(inner_ctx.depth(), 2);

            // the inner transaction started from committed state
            assert_eq!(read_main(&manager, &inner_ctx, "orders", "A")?, None);
            insert_row(&manager, &inner_ctx, "orders", "B", "inner")?;

            let (inner_tx, in_tx) = manager.resolve(&inner_ctx, DatabaseRole::Main);
            assert!(in_tx);
            assert!(!inner_tx.ptr_eq(&manager.main_handle(&outer_ctx)));

            manager.close_tx(&inner_ctx, inner_id, &mut Ok(()))?;
            let mut outcome = Err(TxError::from("outer failed"));
            assert!(manager.close_tx(&outer_ctx, outer_id, &mut outcome).is_err());

            assert_eq!(read_backup(&manager, "orders", "A")?, None);
            assert_eq!(read_backup(&manager, "orders", "B")?, Some("inner".into()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_closing_inner_uncovers_outer() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let outer = manager.begin(&TxContext::new())?;
            let outer_tx = manager.require_main_tx(outer.context());

            let inner = manager.begin_with_options(outer.context(), TxOptions::new_transaction())?;
            let inner_ctx = inner.context().clone();
            assert!(!manager.require_main_tx(&inner_ctx).ptr_eq(&outer_tx));
            inner.close()?;

            // the stale inner id is skipped on the way down the stack
            assert!(manager.require_main_tx(&inner_ctx).ptr_eq(&outer_tx));
            outer.close()?;
            assert!(manager.try_main_tx(&inner_ctx).is_err());
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

// ==================== Routing ====================

#[test]
fn test_auto_handle_routes_reads_to_backup() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let plain = TxContext::new();

            let auto = manager.auto_handle(&plain);
            assert!(auto.ptr_eq(&manager.backup_handle()));
            let err = MemoryHandle::from_handle(&auto)?
                .insert("users", "1", "alice")
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ReadOnlyViolation);

            manager.transaction(&plain, |tx_ctx| {
                let auto = manager.auto_handle(tx_ctx);
                assert!(auto.in_transaction());
                MemoryHandle::from_handle(&auto)?.insert("users", "1", "alice")
            })?;

            assert_eq!(read_backup(&manager, "users", "1")?, Some("alice".into()));
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_non_tx_context_writes_outside_transaction() {
    run_test(
        || create_test_context(),
        |ctx| {
            let manager = ctx.manager();
            let result: TxResult<()> = manager.transaction(&TxContext::new(), |tx_ctx| {
                insert_row(&manager, tx_ctx, "orders", "1", "book")?;

                // audit rows must survive the rollback
                let audit_ctx = manager.non_tx(tx_ctx);
                insert_row(&manager, &audit_ctx, "users", "audit", "order attempt")?;
                assert!(manager.try_main_tx(&audit_ctx).is_err());

                Err(TxError::from("out of stock"))
            });

            assert!(result.is_err());
            assert_eq!(read_backup(&manager, "orders", "1")?, None);
            assert_eq!(
                read_backup(&manager, "users", "audit")?,
                Some("order attempt".into())
            );
            Ok(())
        },
        |ctx| cleanup(ctx),
    )
}
