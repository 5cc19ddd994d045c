use crate::errors::{ErrorKind, TxError, TxResult};
use crate::handle::{DatabaseHandle, RoutingPool};
use crate::manager::TxManager;
use crate::manager_config::TxManagerConfig;
use crate::transaction::TxOptions;

/// Builder for a [`TxManager`].
///
/// Configuration errors are captured as they happen and reported by
/// [`TxManagerBuilder::build`], so the chain never has to be broken up.
///
/// # Examples
///
/// ```rust,ignore
/// use nestx::TxManager;
/// use nestx::transaction::TxOptions;
///
/// let manager = TxManager::builder()
///     .main(main_handle)
///     .backup(backup_handle)
///     .id_high_water_mark(1 << 40)
///     .default_options(TxOptions::new())
///     .build()?;
/// ```
#[derive(Default)]
pub struct TxManagerBuilder {
    error: Option<TxError>,
    config: TxManagerConfig,
    main: Option<DatabaseHandle>,
    backup: Option<DatabaseHandle>,
}

impl TxManagerBuilder {
    pub fn new() -> Self {
        TxManagerBuilder::default()
    }

    /// Binds the main (read-write) role.
    pub fn main(mut self, handle: DatabaseHandle) -> Self {
        self.main = Some(handle);
        self
    }

    /// Binds the backup (read replica) role.
    pub fn backup(mut self, handle: DatabaseHandle) -> Self {
        self.backup = Some(handle);
        self
    }

    /// Binds both roles to the writer and reader views of one pool.
    pub fn routing<P: RoutingPool + ?Sized>(mut self, pool: &P) -> Self {
        self.main = Some(pool.writer());
        self.backup = Some(pool.reader());
        self
    }

    /// Sets the counter value past which transaction ids restart from 1.
    ///
    /// An out-of-range value is captured and returned from `build()`.
    pub fn id_high_water_mark(mut self, mark: u64) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_id_high_water_mark(mark) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the options used by `open_tx`, `begin` and `transaction`.
    pub fn default_options(mut self, options: TxOptions) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_default_options(options) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Builds the manager and freezes its configuration.
    ///
    /// # Errors
    ///
    /// Returns the first captured configuration error, or
    /// [`ErrorKind::InvalidOperation`] if a role has no handle bound.
    pub fn build(self) -> TxResult<TxManager> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let main = self.main.ok_or_else(|| {
            log::error!("Main database handle is not configured");
            TxError::new(
                "Main database handle is not configured",
                ErrorKind::InvalidOperation,
            )
        })?;
        let backup = self.backup.ok_or_else(|| {
            log::error!("Backup database handle is not configured");
            TxError::new(
                "Backup database handle is not configured",
                ErrorKind::InvalidOperation,
            )
        })?;

        self.config.freeze();
        Ok(TxManager::from_parts(main, backup, self.config))
    }
}
