/// Configuration for a [`crate::MemoryDatabase`].
///
/// # Examples
///
/// ```rust
/// use nestx_memory_adapter::MemoryConfig;
///
/// let config = MemoryConfig::new()
///     .name("orders")
///     .table("products")
///     .table("users");
/// assert_eq!(config.db_name(), "orders");
/// assert_eq!(config.tables(), &["products".to_string(), "users".to_string()]);
/// ```
#[derive(Clone, Debug)]
pub struct MemoryConfig {
    name: String,
    tables: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            name: "memory".to_string(),
            tables: Vec::new(),
        }
    }
}

impl MemoryConfig {
    pub fn new() -> Self {
        MemoryConfig::default()
    }

    /// Name used in log lines.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Adds a table to create when the database is opened.
    pub fn table(mut self, table: &str) -> Self {
        if !self.tables.iter().any(|t| t == table) {
            self.tables.push(table.to_string());
        }
        self
    }

    pub fn db_name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}
