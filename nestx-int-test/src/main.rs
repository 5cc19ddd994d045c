use nestx::errors::{TxError, TxResult};
use nestx::transaction::{TxContext, TxOptions};
use nestx_int_test::test_util::{cleanup, create_test_context, insert_row};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn main() -> TxResult<()> {
    colog::init();
    println!("Starting stress test...");
    let ctx = create_test_context()?;

    let threads = 8;
    let per_thread = 20_000;
    let committed = Arc::new(AtomicUsize::new(0));

    let start = std::time::Instant::now();
    let workers: Vec<_> = (0..threads)
        .map(|t| {
            let manager = ctx.manager();
            let committed = committed.clone();
            thread::spawn(move || -> TxResult<()> {
                let mut rng = rand::rng();
                for i in 0..per_thread {
                    let fail = rng.random_bool(0.1);
                    let nested = rng.random_bool(0.25);
                    let result = manager.transaction(&TxContext::new(), |tx_ctx| {
                        insert_row(&manager, tx_ctx, "orders", &format!("{}-{}", t, i), "order")?;
                        if nested {
                            manager.transaction_with_options(
                                tx_ctx,
                                TxOptions::new_transaction(),
                                |inner| {
                                    insert_row(&manager, inner, "users", &format!("{}-{}", t, i), "user")
                                },
                            )?;
                        }
                        if fail {
                            return Err(TxError::from("random failure"));
                        }
                        Ok(())
                    });
                    if result.is_ok() {
                        committed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(result) => result?,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
    let elapsed = start.elapsed();

    let orders = ctx.db().committed_rows("orders")?.len();
    println!(
        "Ran {} transactions in {:?}, {} committed, {} orders stored",
        threads * per_thread,
        elapsed,
        committed.load(Ordering::Relaxed),
        orders
    );
    println!("Database stats: {:?}", ctx.db().stats());

    cleanup(ctx)
}
