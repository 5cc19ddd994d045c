//! Configuration management for the transaction manager.

use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, TxError, TxResult};
use crate::transaction::{TxOptions, DEFAULT_ID_HIGH_WATER_MARK};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Tunables of a [`crate::TxManager`].
///
/// Values can be changed until the manager is built; afterwards the
/// configuration is frozen and every setter fails with
/// [`ErrorKind::InvalidOperation`].
///
/// # Examples
///
/// ```rust
/// use nestx::manager_config::TxManagerConfig;
/// use nestx::transaction::TxOptions;
///
/// let config = TxManagerConfig::new();
/// config.set_id_high_water_mark(1_000_000).unwrap();
/// config.set_default_options(TxOptions::new_transaction()).unwrap();
/// assert_eq!(config.id_high_water_mark(), 1_000_000);
/// ```
#[derive(Clone)]
pub struct TxManagerConfig {
    inner: Arc<TxManagerConfigInner>,
}

impl Default for TxManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TxManagerConfig {
    pub fn new() -> Self {
        TxManagerConfig {
            inner: Arc::new(TxManagerConfigInner::new()),
        }
    }

    /// Counter value past which transaction ids restart from 1.
    pub fn id_high_water_mark(&self) -> u64 {
        self.inner.id_high_water_mark.load(Ordering::Relaxed)
    }

    /// Sets the id high-water mark.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is frozen, or if the mark is zero
    /// or above `i64::MAX`.
    pub fn set_id_high_water_mark(&self, mark: u64) -> TxResult<()> {
        self.inner.set_id_high_water_mark(mark)
    }

    /// Options used by the manager methods that do not take explicit options.
    pub fn default_options(&self) -> TxOptions {
        self.inner.default_options.read_with(|options| *options)
    }

    /// Sets the default open options.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is frozen.
    pub fn set_default_options(&self, options: TxOptions) -> TxResult<()> {
        self.inner.set_default_options(options)
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Relaxed)
    }

    pub(crate) fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::Relaxed);
    }
}

struct TxManagerConfigInner {
    /// Set once a manager has been built from this configuration
    frozen: AtomicBool,
    id_high_water_mark: AtomicU64,
    default_options: Atomic<TxOptions>,
}

impl TxManagerConfigInner {
    fn new() -> Self {
        TxManagerConfigInner {
            frozen: AtomicBool::new(false),
            id_high_water_mark: AtomicU64::new(DEFAULT_ID_HIGH_WATER_MARK),
            default_options: atomic(TxOptions::default()),
        }
    }

    fn check_not_frozen(&self) -> TxResult<()> {
        if self.frozen.load(Ordering::Relaxed) {
            log::error!("Transaction manager configuration cannot be changed after build");
            return Err(TxError::new(
                "Transaction manager configuration cannot be changed after build",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn set_id_high_water_mark(&self, mark: u64) -> TxResult<()> {
        self.check_not_frozen()?;
        if mark == 0 || mark > DEFAULT_ID_HIGH_WATER_MARK {
            log::error!("Invalid transaction id high-water mark {}", mark);
            return Err(TxError::new(
                &format!(
                    "Transaction id high-water mark must be between 1 and {}, got {}",
                    DEFAULT_ID_HIGH_WATER_MARK, mark
                ),
                ErrorKind::InvalidOperation,
            ));
        }
        self.id_high_water_mark.store(mark, Ordering::Relaxed);
        Ok(())
    }

    fn set_default_options(&self, options: TxOptions) -> TxResult<()> {
        self.check_not_frozen()?;
        self.default_options.write_with(|current| *current = options);
        Ok(())
    }
}
