use tracing::info;

use crate::error::Result;
use crate::fetcher::CatalogueSource;
use crate::flattener::flatten;
use crate::store::TableStore;
use crate::table::Table;

/// Fetches `catalogue_code`, flattens it and stores the projected term table
/// under the catalogue code, replacing any earlier copy.
pub fn catalogue_into_store(
    source: &dyn CatalogueSource,
    store: &mut dyn TableStore,
    catalogue_code: &str,
) -> Result<Table> {
    let xml = source.fetch(catalogue_code)?;
    let terms = flatten(&xml)?;
    store.write_table(catalogue_code, &terms)?;
    info!(catalogue = catalogue_code, terms = terms.num_rows(), "Catalogue stored");
    Ok(terms)
}
