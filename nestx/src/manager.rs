use crate::common::panic_message;
use crate::errors::{ErrorKind, TxError, TxResult};
use crate::handle::{DatabaseHandle, DatabaseRole, RoutingPool};
use crate::manager_builder::TxManagerBuilder;
use crate::manager_config::TxManagerConfig;
use crate::transaction::{
    TransactionRecord, TransactionRegistry, TxContext, TxGuard, TxId, TxIdGenerator, TxOptions,
    NO_TX,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Coordinates transactions shared between unrelated call sites.
///
/// A manager binds the [`DatabaseRole::Main`] and [`DatabaseRole::Backup`]
/// roles to two handles and tracks every transaction it opened. Callers open
/// a transaction against a [`TxContext`], pass the derived context down the
/// call chain, and any frame below can ask for "the" handle without knowing
/// whether a transaction is open.
///
/// Cloning is cheap: all clones share the same registry and id counter.
///
/// # Examples
///
/// ```rust,ignore
/// let manager = TxManager::new(main, backup);
/// let ctx = TxContext::new();
///
/// let (ctx, id) = manager.open_tx(&ctx)?;
/// let mut outcome = insert_order(&manager, &ctx);
/// manager.close_tx(&ctx, id, &mut outcome)?;
///
/// fn insert_order(manager: &TxManager, ctx: &TxContext) -> TxResult<()> {
///     // joins the caller's transaction, or runs without one
///     let db = manager.main_handle(ctx);
///     ...
/// }
/// ```
#[derive(Clone)]
pub struct TxManager {
    inner: Arc<TxManagerInner>,
}

impl std::fmt::Debug for TxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxManager").finish_non_exhaustive()
    }
}

impl TxManager {
    /// Creates a manager bound to the given main and backup handles.
    pub fn new(main: DatabaseHandle, backup: DatabaseHandle) -> Self {
        let config = TxManagerConfig::new();
        config.freeze();
        TxManager::from_parts(main, backup, config)
    }

    /// Creates a manager over a single pool: main is the pool's read-write
    /// view and backup its read-only view.
    pub fn with_routing<P: RoutingPool + ?Sized>(pool: &P) -> Self {
        TxManager::new(pool.writer(), pool.reader())
    }

    pub fn builder() -> TxManagerBuilder {
        TxManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        main: DatabaseHandle,
        backup: DatabaseHandle,
        config: TxManagerConfig,
    ) -> Self {
        TxManager {
            inner: Arc::new(TxManagerInner::new(main, backup, config)),
        }
    }

    pub fn config(&self) -> &TxManagerConfig {
        &self.inner.config
    }

    /// Returns a copy of `ctx` on which handle resolution never reports a
    /// transaction, whatever its stack holds.
    pub fn non_tx(&self, ctx: &TxContext) -> TxContext {
        ctx.non_tx()
    }

    /// Opens a main transaction with the configured default options.
    ///
    /// See [`TxManager::open_tx_with_options`].
    pub fn open_tx(&self, ctx: &TxContext) -> TxResult<(TxContext, TxId)> {
        self.open_tx_with_options(ctx, self.config().default_options())
    }

    /// Opens a main transaction.
    ///
    /// Unless `options` forces a new transaction, a main transaction already
    /// reachable from `ctx` is reused: the context comes back unchanged with
    /// id [`NO_TX`], and nothing needs to be closed. Otherwise a transaction
    /// is begun on the main handle and returned together with a derived
    /// context carrying its id.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::BeginFailure`] if the main handle cannot begin
    /// - [`ErrorKind::InternalError`] if every id up to the configured
    ///   high-water mark is held by an open transaction
    ///
    /// Nothing is registered in either case.
    pub fn open_tx_with_options(
        &self,
        ctx: &TxContext,
        options: TxOptions,
    ) -> TxResult<(TxContext, TxId)> {
        self.inner.open_tx(ctx, DatabaseRole::Main, options)
    }

    /// Closes a transaction opened by [`TxManager::open_tx`].
    ///
    /// `outcome` is the result of the guarded work: `Ok` commits, `Err` rolls
    /// back. If the thread is unwinding from a panic and `outcome` is `Ok`,
    /// the transaction is rolled back as a captured fault. The panic payload
    /// is out of reach here, so the fault carries a generic message; run the
    /// work through [`TxManager::transaction`] to keep the panic's own
    /// message as the outcome. The resolved result is written back into
    /// `outcome` and also returned.
    ///
    /// # Errors
    ///
    /// - the original `Err` outcome after a successful rollback
    /// - [`ErrorKind::RollbackFailure`] wrapping the original outcome
    /// - [`ErrorKind::CommitFailure`] wrapping the handle's error
    /// - [`ErrorKind::AlreadyClosed`] if `id` is not open
    pub fn close_tx(&self, ctx: &TxContext, id: TxId, outcome: &mut TxResult<()>) -> TxResult<()> {
        let resolved = self.inner.close_tx(ctx, id, outcome.clone());
        *outcome = resolved.clone();
        resolved
    }

    /// Opens a main transaction and returns a guard that closes it.
    pub fn begin(&self, ctx: &TxContext) -> TxResult<TxGuard> {
        self.begin_with_options(ctx, self.config().default_options())
    }

    /// Opens a main transaction and returns a guard that closes it.
    ///
    /// Dropping the guard without calling [`TxGuard::close`] rolls the
    /// transaction back.
    pub fn begin_with_options(&self, ctx: &TxContext, options: TxOptions) -> TxResult<TxGuard> {
        let (tx_ctx, id) = self.open_tx_with_options(ctx, options)?;
        Ok(TxGuard::new(self.clone(), tx_ctx, id))
    }

    /// Runs `f` inside a main transaction with the default options.
    pub fn transaction<T, F>(&self, ctx: &TxContext, f: F) -> TxResult<T>
    where
        F: FnOnce(&TxContext) -> TxResult<T>,
    {
        self.transaction_with_options(ctx, self.config().default_options(), f)
    }

    /// Runs `f` inside a main transaction.
    ///
    /// `Ok` commits and returns the value unless the commit fails; `Err`
    /// rolls back and returns the error. If `f` panics the transaction is
    /// rolled back first and the original panic is then resumed.
    pub fn transaction_with_options<T, F>(
        &self,
        ctx: &TxContext,
        options: TxOptions,
        f: F,
    ) -> TxResult<T>
    where
        F: FnOnce(&TxContext) -> TxResult<T>,
    {
        let (tx_ctx, id) = self.open_tx_with_options(ctx, options)?;

        match panic::catch_unwind(AssertUnwindSafe(|| f(&tx_ctx))) {
            Ok(result) => {
                let mut outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
                self.close_tx(&tx_ctx, id, &mut outcome)?;
                result
            }
            Err(payload) => {
                let mut outcome = Err(TxError::new(
                    &panic_message(payload.as_ref()),
                    ErrorKind::CapturedFault,
                ));
                if let Err(err) = self.close_tx(&tx_ctx, id, &mut outcome) {
                    log::debug!("Transaction {} closed after panic: {}", id, err);
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Resolves `role` against the stack of `ctx`.
    ///
    /// Returns the innermost open transaction of that role and `true`, or
    /// the role's base handle and `false`.
    pub fn resolve(&self, ctx: &TxContext, role: DatabaseRole) -> (DatabaseHandle, bool) {
        self.inner.resolve(ctx, role)
    }

    /// The open main transaction if one is reachable, else the plain main handle.
    pub fn main_handle(&self, ctx: &TxContext) -> DatabaseHandle {
        self.resolve(ctx, DatabaseRole::Main).0
    }

    /// The plain backup handle. Backup is never transactional.
    pub fn backup_handle(&self) -> DatabaseHandle {
        self.inner.backup.clone()
    }

    /// The open main transaction if one is reachable, else the backup handle.
    pub fn auto_handle(&self, ctx: &TxContext) -> DatabaseHandle {
        match self.resolve(ctx, DatabaseRole::Main) {
            (handle, true) => handle,
            (_, false) => self.backup_handle(),
        }
    }

    /// The open main transaction.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotOpenTransaction`] if none is reachable from `ctx`.
    pub fn try_main_tx(&self, ctx: &TxContext) -> TxResult<DatabaseHandle> {
        match self.resolve(ctx, DatabaseRole::Main) {
            (handle, true) => Ok(handle),
            (_, false) => Err(TxError::new(
                "transaction not open",
                ErrorKind::NotOpenTransaction,
            )),
        }
    }

    /// The open main transaction.
    ///
    /// # Panics
    ///
    /// Panics with "transaction not open" if none is reachable from `ctx`.
    /// Running the caller's writes outside the transaction it expects is a
    /// contract violation, not a recoverable condition.
    pub fn require_main_tx(&self, ctx: &TxContext) -> DatabaseHandle {
        match self.try_main_tx(ctx) {
            Ok(handle) => handle,
            Err(err) => panic!("{}", err),
        }
    }

    /// Ids of all transactions currently open on this manager.
    pub fn active_transactions(&self) -> Vec<TxId> {
        self.inner.registry.ids()
    }

    pub fn open_transaction_count(&self) -> usize {
        self.inner.registry.len()
    }
}

struct TxManagerInner {
    main: DatabaseHandle,
    backup: DatabaseHandle,
    config: TxManagerConfig,
    ids: TxIdGenerator,
    registry: TransactionRegistry,
}

impl TxManagerInner {
    fn new(main: DatabaseHandle, backup: DatabaseHandle, config: TxManagerConfig) -> Self {
        TxManagerInner {
            main,
            backup,
            ids: TxIdGenerator::new(config.id_high_water_mark()),
            config,
            registry: TransactionRegistry::new(),
        }
    }

    fn base_handle(&self, role: DatabaseRole) -> &DatabaseHandle {
        match role {
            DatabaseRole::Main => &self.main,
            DatabaseRole::Backup => &self.backup,
        }
    }

    /// Innermost live transaction of `role` on the stack, ignoring the
    /// non-transactional marker.
    fn find_open(&self, ctx: &TxContext, role: DatabaseRole) -> Option<(TxId, TransactionRecord)> {
        ctx.tx_ids().find_map(|id| {
            self.registry
                .load(id)
                .filter(|record| record.role() == role)
                .map(|record| (id, record))
        })
    }

    fn resolve(&self, ctx: &TxContext, role: DatabaseRole) -> (DatabaseHandle, bool) {
        if ctx.is_non_tx() {
            return (self.base_handle(role).clone(), false);
        }
        match self.find_open(ctx, role) {
            Some((_, record)) => (record.transaction().clone(), true),
            None => (self.base_handle(role).clone(), false),
        }
    }

    /// Mints an id that is not live, even right after a counter restart.
    ///
    /// A full cycle of the counter covers at most `high_water_mark + 1`
    /// values; if all of them are live there is no id to hand out.
    fn mint_id(&self) -> TxResult<TxId> {
        let attempts = self.ids.high_water_mark().saturating_add(1);
        for _ in 0..attempts {
            let id = self.ids.next_id();
            if !self.registry.contains(id) {
                return Ok(id);
            }
            log::warn!("Transaction id {} is still open, skipping", id);
        }

        log::error!(
            "No free transaction id below high-water mark {}",
            self.ids.high_water_mark()
        );
        Err(TxError::new(
            &format!(
                "no free transaction id below high-water mark {}",
                self.ids.high_water_mark()
            ),
            ErrorKind::InternalError,
        ))
    }

    fn open_tx(
        &self,
        ctx: &TxContext,
        role: DatabaseRole,
        options: TxOptions,
    ) -> TxResult<(TxContext, TxId)> {
        if !options.is_force_new() {
            if let Some((open_id, _)) = self.find_open(ctx, role) {
                log::debug!(
                    "Reusing {} database transaction {} from context",
                    role,
                    open_id
                );
                return Ok((ctx.clone(), NO_TX));
            }
        }

        let id = self.mint_id()?;
        let database = self.base_handle(role).clone();
        let transaction = database.begin().map_err(|err| {
            log::error!("Failed to begin {} database transaction: {}", role, err);
            TxError::new_with_cause(
                &format!("{} database transaction begin error", role),
                ErrorKind::BeginFailure,
                err,
            )
        })?;

        self.registry
            .store(id, TransactionRecord::new(role, database, transaction));
        log::debug!(
            "Opened {} database transaction {} at depth {}",
            role,
            id,
            ctx.depth() + 1
        );
        Ok((ctx.with_tx_id(id), id))
    }

    fn close_tx(&self, ctx: &TxContext, id: TxId, outcome: TxResult<()>) -> TxResult<()> {
        if id == NO_TX {
            return outcome;
        }

        let outcome = match outcome {
            Ok(()) if thread::panicking() => Err(TxError::new(
                "transaction closed while unwinding from a panic",
                ErrorKind::CapturedFault,
            )),
            other => other,
        };

        let record = match self.registry.remove(id) {
            Some(record) => record,
            None => {
                log::error!("Database transaction {} already closed", id);
                let message = format!("database transaction {} already closed", id);
                return Err(match outcome {
                    Err(cause) => {
                        TxError::new_with_cause(&message, ErrorKind::AlreadyClosed, cause)
                    }
                    Ok(()) => TxError::new(&message, ErrorKind::AlreadyClosed),
                });
            }
        };

        let role = record.role();
        match outcome {
            Err(cause) => match record.transaction().rollback() {
                Ok(()) => {
                    log::debug!(
                        "Rolled back {} database transaction {} at depth {}: {}",
                        role,
                        id,
                        ctx.depth(),
                        cause
                    );
                    Err(cause)
                }
                Err(rollback_err) => {
                    log::error!(
                        "Failed to roll back {} database transaction {}: {}",
                        role,
                        id,
                        rollback_err
                    );
                    Err(TxError::new_with_cause(
                        &format!(
                            "{} database transaction rollback error: {}",
                            role, rollback_err
                        ),
                        ErrorKind::RollbackFailure,
                        cause,
                    ))
                }
            },
            Ok(()) => match record.transaction().commit() {
                Ok(()) => {
                    log::debug!(
                        "Committed {} database transaction {} at depth {}",
                        role,
                        id,
                        ctx.depth()
                    );
                    Ok(())
                }
                Err(commit_err) => {
                    log::error!(
                        "Failed to commit {} database transaction {}: {}",
                        role,
                        id,
                        commit_err
                    );
                    Err(TxError::new_with_cause(
                        &format!("{} database transaction commit error", role),
                        ErrorKind::CommitFailure,
                        commit_err,
                    ))
                }
            },
        }
    }
}
