use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of an open transaction. `0` means "nothing was opened".
pub type TxId = u64;

/// The id returned by a reentrant open; closing it is a no-op.
pub const NO_TX: TxId = 0;

/// Default high-water mark; past it the counter restarts from 1.
pub const DEFAULT_ID_HIGH_WATER_MARK: u64 = i64::MAX as u64;

/// Lock-free transaction id generator.
///
/// The common path is a single atomic increment. Only when the counter has
/// passed the high-water mark does a caller take the reset lock, re-check,
/// and restart the counter from 1.
pub struct TxIdGenerator {
    counter: AtomicU64,
    high_water_mark: u64,
    reset_lock: Mutex<()>,
}

impl TxIdGenerator {
    pub fn new(high_water_mark: u64) -> Self {
        TxIdGenerator {
            counter: AtomicU64::new(0),
            high_water_mark,
            reset_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(start: u64, high_water_mark: u64) -> Self {
        TxIdGenerator {
            counter: AtomicU64::new(start),
            high_water_mark,
            reset_lock: Mutex::new(()),
        }
    }

    /// Returns the next id. Never returns [`NO_TX`].
    pub fn next_id(&self) -> TxId {
        if self.counter.load(Ordering::Acquire) > self.high_water_mark {
            let _guard = self.reset_lock.lock();
            if self.counter.load(Ordering::Acquire) > self.high_water_mark {
                log::warn!(
                    "Transaction id counter passed {}, restarting from 1",
                    self.high_water_mark
                );
                self.counter.store(1, Ordering::Release);
            }
        }
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }
}

impl Default for TxIdGenerator {
    fn default() -> Self {
        TxIdGenerator::new(DEFAULT_ID_HIGH_WATER_MARK)
    }
}
