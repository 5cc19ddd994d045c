use std::fmt::{Display, Formatter};

/// Logical identity of one of the two databases a manager routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseRole {
    /// The read-write primary; the only role transactions are opened on.
    Main,
    /// The read replica; never transactional.
    Backup,
}

impl DatabaseRole {
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseRole::Main => "main",
            DatabaseRole::Backup => "backup",
        }
    }
}

impl Display for DatabaseRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
