/// Options for opening a transaction.
///
/// # Examples
///
/// ```rust
/// use nestx::transaction::TxOptions;
///
/// let reuse = TxOptions::default();
/// assert!(!reuse.is_force_new());
///
/// let fresh = TxOptions::new_transaction();
/// assert!(fresh.is_force_new());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOptions {
    force_new: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        TxOptions::default()
    }

    /// Options that skip reentrancy detection and always begin a fresh
    /// nested transaction.
    pub fn new_transaction() -> Self {
        TxOptions { force_new: true }
    }

    pub fn force_new(mut self, force_new: bool) -> Self {
        self.force_new = force_new;
        self
    }

    pub fn is_force_new(&self) -> bool {
        self.force_new
    }
}
