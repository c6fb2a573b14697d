//! Minimal rectangular table: ordered column names plus rows of nullable
//! string cells aligned to those columns.

use std::fmt;

use ahash::{AHashMap, AHashSet};

/// A single value. `None` is a null cell.
pub type Cell = Option<String>;

/// Insertion-ordered set of column names.
///
/// Discovery walks the document in order and may see the same tag many
/// times; only the first sighting fixes its position.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    order: Vec<String>,
    seen: AHashSet<String>,
}

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name` unless already present. Returns true when added.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

/// One sparse record built during flattening, keyed by column name.
///
/// Later writes to the same key overwrite earlier ones, matching how a
/// term carrying the same field twice keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct SparseRow {
    values: AHashMap<String, Cell>,
}

impl SparseRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Cell) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.values.get(column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from positional rows. Rows shorter than the header
    /// are padded with nulls; longer rows are truncated.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Lays sparse rows onto a fixed schema. Any column a row never wrote
    /// becomes a null cell; keys outside the schema are dropped.
    pub fn from_sparse(columns: ColumnSet, sparse: &[SparseRow]) -> Self {
        let columns = columns.into_vec();
        let rows = sparse
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|name| record.get(name).cloned().flatten())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Cell at `row` in the named column, flattened to `None` when either the
    /// row, the column or the value is missing.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All values of one column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    /// Projects onto exactly `names`, in that order. A name the table does
    /// not carry yields an all-null column so the output shape never depends
    /// on what the input happened to contain.
    pub fn select(&self, names: &[&str]) -> Table {
        let indices: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row[i].clone()))
                    .collect()
            })
            .collect();
        Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        }
    }

    /// Prepends a column whose cells come from `values(row_index)`.
    pub fn with_leading_column(mut self, name: &str, values: impl Fn(usize) -> Cell) -> Table {
        self.columns.insert(0, name.to_string());
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.insert(0, values(i));
        }
        self
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let line: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("NULL")).collect();
            writeln!(f, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}
