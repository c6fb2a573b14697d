use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow2::array::{Array, MutableUtf8Array, Utf8Array};
use arrow2::chunk::Chunk;
use arrow2::datatypes::{DataType, Field, Schema};
use arrow2::io::parquet::read;
use arrow2::io::parquet::write::{
    transverse, CompressionOptions, Encoding, FileWriter, RowGroupIterator, Version, WriteOptions,
};
use tracing::info;

use super::TableStore;
use crate::error::{CatalogueError, Result};
use crate::table::{Cell, Table};

const WRITE_OPTIONS: WriteOptions = WriteOptions {
    write_statistics: true,
    compression: CompressionOptions::Snappy,
    version: Version::V2,
    data_pagesize_limit: None,
};

/// Directory of parquet files, one `<name>.parquet` per table. Every column
/// is a nullable UTF-8 string.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    dir: PathBuf,
}

impl ParquetStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| CatalogueError::persistence(&dir.display().to_string(), e))?;
        Ok(Self { dir })
    }

    fn table_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(&['/', '\\'][..]) || name == "." || name == ".." {
            return Err(CatalogueError::persistence(name, "not a valid table file name"));
        }
        Ok(self.dir.join(format!("{}.parquet", name)))
    }
}

fn to_chunk(table: &Table) -> arrow2::error::Result<Chunk<Box<dyn Array>>> {
    let arrays: Vec<Box<dyn Array>> = (0..table.num_columns())
        .map(|idx| {
            let mut col = MutableUtf8Array::<i32>::with_capacity(table.num_rows());
            for row in table.rows() {
                col.push(row[idx].as_deref());
            }
            let array: Utf8Array<i32> = col.into();
            Box::new(array) as Box<dyn Array>
        })
        .collect();
    Chunk::try_new(arrays)
}

/// Reads a string column back into cells. Files written elsewhere may use
/// 64-bit offsets, so both widths are accepted.
fn string_cells(array: &dyn Array) -> Option<Vec<Cell>> {
    let any = array.as_any();
    if let Some(utf8) = any.downcast_ref::<Utf8Array<i32>>() {
        return Some(utf8.iter().map(|v| v.map(str::to_string)).collect());
    }
    if let Some(utf8) = any.downcast_ref::<Utf8Array<i64>>() {
        return Some(utf8.iter().map(|v| v.map(str::to_string)).collect());
    }
    None
}

fn write_parquet(table: &Table, path: &Path) -> arrow2::error::Result<()> {
    let schema = Schema::from(
        table
            .columns()
            .iter()
            .map(|c| Field::new(c.as_str(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    );

    let chunk = to_chunk(table)?;

    let encodings: Vec<Vec<Encoding>> = schema
        .fields
        .iter()
        .map(|f| transverse(&f.data_type, |_| Encoding::Plain))
        .collect();

    let row_groups = RowGroupIterator::try_new(vec![Ok(chunk)].into_iter(), &schema, WRITE_OPTIONS, encodings)?;

    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(file, schema, WRITE_OPTIONS)?;
    for group in row_groups {
        writer.write(group?)?;
    }
    writer.end(None)?;
    Ok(())
}

impl TableStore for ParquetStore {
    fn write_table(&mut self, name: &str, table: &Table) -> Result<()> {
        if table.num_columns() == 0 {
            return Err(CatalogueError::persistence(name, "cannot store a table without columns"));
        }
        let path = self.table_path(name)?;

        // Write beside the target and rename over it, so a reader sees either
        // the old file or the complete new one.
        let tmp = path.with_extension("parquet.tmp");
        if let Err(e) = write_parquet(table, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(CatalogueError::persistence(name, e));
        }
        fs::rename(&tmp, &path).map_err(|e| CatalogueError::persistence(name, e))?;

        info!(table = name, rows = table.num_rows(), path = %path.display(), "Stored table as parquet");
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        let path = self.table_path(name)?;
        let err = |e: arrow2::error::Error| CatalogueError::persistence(name, e);

        let mut file = File::open(&path).map_err(|e| CatalogueError::persistence(name, e))?;
        let metadata = read::read_metadata(&mut file).map_err(err)?;
        let schema = read::infer_schema(&metadata).map_err(err)?;
        let columns: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();

        let mut table = Table::new(columns);
        let chunks = read::FileReader::new(file, metadata.row_groups, schema, None, None, None);
        for chunk in chunks {
            let chunk = chunk.map_err(err)?;
            let cells = chunk
                .arrays()
                .iter()
                .map(|a| string_cells(a.as_ref()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| CatalogueError::persistence(name, "non-string column in parquet file"))?;

            for i in 0..chunk.len() {
                table.push_row(cells.iter().map(|col| col[i].clone()).collect());
            }
        }
        Ok(table)
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.table_path(name)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_strings_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ParquetStore::open(dir.path()).unwrap();
        let table = Table::from_rows(
            vec!["termCode".into(), "termExtendedName".into()],
            vec![
                vec![Some("A01".into()), Some("Alpha".into())],
                vec![Some("A02".into()), None],
                vec![None, Some("".into())],
            ],
        );

        store.write_table("ACTION", &table).unwrap();
        assert!(store.has_table("ACTION").unwrap());
        assert_eq!(store.read_table("ACTION").unwrap(), table);
        assert!(!dir.path().join("ACTION.parquet.tmp").exists());
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ParquetStore::open(dir.path()).unwrap();
        let table = Table::from_rows(vec!["a".into()], vec![]);
        assert!(store.write_table("../escape", &table).is_err());
        assert!(!store.has_table("missing").unwrap());
        assert!(store.read_table("missing").is_err());
    }
}
