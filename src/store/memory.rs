use ahash::AHashMap;

use super::TableStore;
use crate::error::{CatalogueError, Result};
use crate::table::Table;

/// In-process store, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: AHashMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl TableStore for MemoryStore {
    fn write_table(&mut self, name: &str, table: &Table) -> Result<()> {
        self.tables.insert(name.to_string(), table.clone());
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogueError::persistence(name, "no such table"))
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables.contains_key(name))
    }
}
