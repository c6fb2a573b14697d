//! Fetch controlled-vocabulary catalogues from the provider's export API,
//! flatten their XML into tables and persist them for enrichment lookups.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod flattener;
pub mod ingest;
pub mod log;
pub mod pipeline;
pub mod store;
pub mod table;
pub mod xml;

pub use error::{CatalogueError, Result};
pub use fetcher::{fetch, strip_preamble, CatalogueFetcher, CatalogueSource};
pub use flattener::{flatten, flatten_all, CatalogueTables, TERM_CODE, TERM_EXTENDED_NAME};
pub use ingest::{user_data_into_store, USER_DATA_TABLE};
pub use pipeline::catalogue_into_store;
pub use store::{MemoryStore, ParquetStore, SqliteStore, TableStore};
pub use table::{Cell, Table};
