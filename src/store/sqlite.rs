use std::path::Path;

use rusqlite::{params, params_from_iter, Connection};
use tracing::info;

use super::TableStore;
use crate::error::{CatalogueError, Result};
use crate::table::{Cell, Table};

/// SQLite-backed store. Every column is `TEXT`; nulls stay `NULL`.
pub struct SqliteStore {
    conn: Connection,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| CatalogueError::persistence(&path.display().to_string(), e))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| CatalogueError::persistence(":memory:", e))?;
        Ok(Self { conn })
    }
}

impl TableStore for SqliteStore {
    fn write_table(&mut self, name: &str, table: &Table) -> Result<()> {
        if table.num_columns() == 0 {
            return Err(CatalogueError::persistence(name, "cannot store a table without columns"));
        }
        let err = |e: rusqlite::Error| CatalogueError::persistence(name, e);
        let quoted = quote_ident(name);

        // Drop, create and fill inside one transaction so the old table stays
        // visible until the new one is complete.
        let tx = self.conn.transaction().map_err(err)?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quoted), [])
            .map_err(err)?;

        let column_defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        tx.execute(&format!("CREATE TABLE {} ({})", quoted, column_defs.join(", ")), [])
            .map_err(err)?;

        {
            let placeholders = vec!["?"; table.num_columns()].join(", ");
            let mut stmt = tx
                .prepare(&format!("INSERT INTO {} VALUES ({})", quoted, placeholders))
                .map_err(err)?;
            for row in table.rows() {
                stmt.execute(params_from_iter(row.iter())).map_err(err)?;
            }
        }

        tx.commit().map_err(err)?;
        info!(table = name, rows = table.num_rows(), "Stored table in SQLite");
        Ok(())
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        if !self.has_table(name)? {
            return Err(CatalogueError::persistence(name, "no such table"));
        }
        let err = |e: rusqlite::Error| CatalogueError::persistence(name, e);

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(name)))
            .map_err(err)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Cell>(i))
                    .collect::<rusqlite::Result<Vec<Cell>>>()
            })
            .map_err(err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(err)?;

        Ok(Table::from_rows(columns, rows))
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| CatalogueError::persistence(name, e))?;
        Ok(count > 0)
    }
}
