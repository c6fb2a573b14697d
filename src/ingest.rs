//! Uploaded user data: read a spreadsheet upload (CSV or an Excel
//! workbook) as-is and store it for later enrichment.

use std::io;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::info;

use crate::error::{CatalogueError, Result};
use crate::store::TableStore;
use crate::table::{Cell, Table};

pub const USER_DATA_TABLE: &str = "DATA_TO_BE_ENRICHED";
/// Positional row index prepended to uploaded data.
pub const INDEX_COLUMN: &str = "index";

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Reads CSV from any reader. `label` only appears in error messages.
pub fn read_user_data_from<R: io::Read>(reader: R, label: &str) -> Result<Table> {
    let fail = |e: csv::Error| CatalogueError::Ingest {
        path: label.to_string(),
        reason: e.to_string(),
    };

    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(fail)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = Table::new(headers);
    for record in csv_reader.records() {
        let record = record.map_err(fail)?;
        table.push_row(
            record
                .iter()
                .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                .collect(),
        );
    }

    with_index(table, label)
}

/// Reads the first sheet of a workbook; its first row names the columns.
pub fn read_workbook(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let fail = |reason: String| CatalogueError::Ingest {
        path: label.clone(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| fail(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| fail("workbook has no sheets".to_string()))?
        .map_err(|e| fail(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    let mut table = Table::new(headers);
    for row in rows {
        table.push_row(row.iter().map(workbook_cell).collect());
    }

    with_index(table, &label)
}

fn workbook_cell(value: &Data) -> Cell {
    let text = value.to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn with_index(table: Table, label: &str) -> Result<Table> {
    if table.column_index(INDEX_COLUMN).is_some() {
        return Err(CatalogueError::Ingest {
            path: label.to_string(),
            reason: format!("upload already has a column named '{}'", INDEX_COLUMN),
        });
    }
    Ok(table.with_leading_column(INDEX_COLUMN, |i| Some(i.to_string())))
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Reads an upload, picking the workbook or CSV reader by file extension.
pub fn read_user_data(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    if is_workbook(path) {
        return read_workbook(path);
    }
    let file = std::fs::File::open(path).map_err(|e| CatalogueError::Ingest {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    read_user_data_from(io::BufReader::new(file), &path.display().to_string())
}

/// Reads `path` and stores it as [`USER_DATA_TABLE`], replacing any
/// previous upload.
pub fn user_data_into_store(store: &mut dyn TableStore, path: impl AsRef<Path>) -> Result<Table> {
    let table = read_user_data(&path)?;
    store.write_table(USER_DATA_TABLE, &table)?;
    info!(
        path = %path.as_ref().display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "Stored user data"
    );
    Ok(table)
}
