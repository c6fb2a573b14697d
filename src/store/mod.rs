//! Named-table persistence.
//!
//! A store holds whole tables under a name. Writing a name that already
//! exists replaces the previous table in one step; readers never observe a
//! half-written table.

mod memory;
mod parquet;
mod sqlite;

pub use memory::MemoryStore;
pub use parquet::ParquetStore;
pub use sqlite::SqliteStore;

use crate::config::{Settings, StoreKind};
use crate::error::Result;
use crate::table::Table;

pub trait TableStore {
    /// Creates `name`, replacing any existing table of that name.
    fn write_table(&mut self, name: &str, table: &Table) -> Result<()>;

    fn read_table(&self, name: &str) -> Result<Table>;

    fn has_table(&self, name: &str) -> Result<bool>;
}

/// Opens the store that holds flattened catalogues.
pub fn open_catalogue_store(settings: &Settings) -> Result<Box<dyn TableStore>> {
    let store: Box<dyn TableStore> = match settings.store {
        StoreKind::Sqlite => Box::new(SqliteStore::open(&settings.catalogue_db)?),
        StoreKind::Parquet => Box::new(ParquetStore::open(settings.parquet_dir.join("catalogues"))?),
    };
    Ok(store)
}

/// Opens the store that holds uploaded user data.
pub fn open_user_data_store(settings: &Settings) -> Result<Box<dyn TableStore>> {
    let store: Box<dyn TableStore> = match settings.store {
        StoreKind::Sqlite => Box::new(SqliteStore::open(&settings.user_data_db)?),
        StoreKind::Parquet => Box::new(ParquetStore::open(settings.parquet_dir.join("user_data"))?),
    };
    Ok(store)
}
