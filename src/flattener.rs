//! Flattens a catalogue export into tables.
//!
//! A catalogue document looks roughly like
//!
//! ```text
//! catalogue
//! ├── catalogueDesc / catalogueVersion / catalogueGroups
//! ├── hierarchies/hierarchy*      (hierarchyDesc, hierarchyVersion, ...)
//! ├── attributes/attribute*       (attributeDesc, attributeVersion, ...)
//! └── terms/term*
//!     ├── termDesc, termVersion
//!     ├── hierarchyAssignments/*  (hierarchyCode, parentCode, order, reportable)
//!     └── implicitAttributes/*    (attributeCode, attributeValue)
//! ```
//!
//! Which fields appear varies per catalogue and per term, so every table is
//! built in two passes: discover the ordered column set over all entries,
//! then build one sparse row per entry and lay it onto that schema.

use tracing::{debug, info};

use crate::error::{CatalogueError, Result};
use crate::table::{ColumnSet, SparseRow, Table};
use crate::xml::{parse_document, XmlElement};

pub const TERM_CODE: &str = "termCode";
pub const TERM_EXTENDED_NAME: &str = "termExtendedName";

const METADATA_SECTIONS: [&str; 3] = ["catalogueDesc", "catalogueVersion", "catalogueGroups"];
const CATALOGUE_NAME: &str = "name";

const MASTER_FLAG: &str = "masterFlag";
const MASTER_PARENT_CODE: &str = "masterParentCode";
const MASTER_ORDER: &str = "masterOrder";
const MASTER_REPORTABLE: &str = "masterReportable";
const MASTER_HIERARCHY_CODE: &str = "masterHierarchyCode";
const MASTER_COLUMNS: [&str; 5] = [
    MASTER_FLAG,
    MASTER_PARENT_CODE,
    MASTER_ORDER,
    MASTER_REPORTABLE,
    MASTER_HIERARCHY_CODE,
];

const PARENT_CODE_SUFFIX: &str = "ParentCode";
const ORDER_SUFFIX: &str = "Order";
const REPORTABLE_SUFFIX: &str = "Reportable";
const HIERARCHY_CODE_SUFFIX: &str = "HierarchyCode";
const HIERARCHY_SUFFIXES: [&str; 4] = [
    PARENT_CODE_SUFFIX,
    ORDER_SUFFIX,
    REPORTABLE_SUFFIX,
    HIERARCHY_CODE_SUFFIX,
];

/// The four tables produced from one catalogue document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueTables {
    /// Exactly one row.
    pub metadata: Table,
    pub hierarchies: Table,
    pub attributes: Table,
    /// One row per `<term>`, in document order.
    pub terms: Table,
}

impl CatalogueTables {
    /// The catalogue's own name, which is also the code of its master
    /// hierarchy.
    pub fn catalogue_name(&self) -> Option<&str> {
        self.metadata.value(0, CATALOGUE_NAME)
    }

    /// The two columns downstream enrichment needs.
    pub fn term_projection(&self) -> Table {
        self.terms.select(&[TERM_CODE, TERM_EXTENDED_NAME])
    }
}

/// Parses `xml` and returns the term table projected to
/// `termCode` and `termExtendedName`.
pub fn flatten(xml: &str) -> Result<Table> {
    Ok(flatten_all(xml)?.term_projection())
}

/// Parses `xml` and returns all four tables unprojected.
pub fn flatten_all(xml: &str) -> Result<CatalogueTables> {
    let root = parse_document(xml)?;
    flatten_document(&root)
}

pub fn flatten_document(root: &XmlElement) -> Result<CatalogueTables> {
    let metadata = metadata_table(root);
    let hierarchies = entry_table(root, "hierarchy");
    let attributes = entry_table(root, "attribute");

    let master = metadata.value(0, CATALOGUE_NAME);
    let terms = term_table(root, master)?;

    info!(
        catalogue = master.unwrap_or("<unnamed>"),
        hierarchies = hierarchies.num_rows(),
        attributes = attributes.num_rows(),
        terms = terms.num_rows(),
        term_columns = terms.num_columns(),
        "Flattened catalogue"
    );

    Ok(CatalogueTables {
        metadata,
        hierarchies,
        attributes,
        terms,
    })
}

/// Collects every element named `tag` outside of `<term>` subtrees, in
/// document order. Terms carry their own nested sections and must not leak
/// into the catalogue-level tables.
fn catalogue_entries<'a>(root: &'a XmlElement, tag: &str) -> Vec<&'a XmlElement> {
    fn walk<'a>(node: &'a XmlElement, tag: &str, out: &mut Vec<&'a XmlElement>) {
        for child in &node.children {
            if child.tag == tag {
                out.push(child);
            } else if child.tag != "term" {
                walk(child, tag, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(root, tag, &mut out);
    out
}

fn metadata_table(root: &XmlElement) -> Table {
    let mut columns = ColumnSet::new();
    let mut row = SparseRow::new();

    for section in METADATA_SECTIONS {
        // Any section may be missing from an export.
        let Some(node) = catalogue_entries(root, section).into_iter().next() else {
            continue;
        };
        for field in &node.children {
            if let Some(text) = field.text() {
                columns.insert(&field.tag);
                row.set(field.tag.clone(), Some(text.to_string()));
            }
        }
    }

    Table::from_sparse(columns, &[row])
}

/// Hierarchy and attribute tables share one shape: columns come from the
/// two-level walk entry -> section -> field, while each row takes every
/// descendant with text.
fn entry_table(root: &XmlElement, entry_tag: &str) -> Table {
    let entries = catalogue_entries(root, entry_tag);

    let mut columns = ColumnSet::new();
    for entry in &entries {
        for section in &entry.children {
            for field in &section.children {
                if field.text().is_some() {
                    columns.insert(&field.tag);
                }
            }
        }
    }

    let rows: Vec<SparseRow> = entries
        .iter()
        .map(|entry| {
            let mut row = SparseRow::new();
            for node in entry.descendants() {
                if let Some(text) = node.text() {
                    row.set(node.tag.clone(), Some(text.to_string()));
                }
            }
            row
        })
        .collect();

    debug!(entry = entry_tag, columns = columns.len(), rows = rows.len(), "Built entry table");
    Table::from_sparse(columns, &rows)
}

fn term_table(root: &XmlElement, master: Option<&str>) -> Result<Table> {
    let terms = catalogue_entries(root, "term");
    let columns = term_columns(&terms, master)?;
    debug!(columns = columns.len(), terms = terms.len(), "Discovered term columns");

    let rows = terms
        .iter()
        .enumerate()
        .map(|(index, term)| term_row(term, index, master))
        .collect::<Result<Vec<_>>>()?;

    Ok(Table::from_sparse(columns, &rows))
}

/// Human-readable handle for a term in error messages.
fn term_label(term: &XmlElement, index: usize) -> String {
    let code = term
        .children_named("termDesc")
        .find_map(|desc| desc.child(TERM_CODE).and_then(XmlElement::text));
    match code {
        Some(code) => format!("term '{}'", code),
        None => format!("term #{}", index + 1),
    }
}

fn secondary_column(code: &str, suffix: &str) -> String {
    format!("{}{}", code, suffix)
}

/// Reads the `hierarchyCode` of one assignment entry. It is the key every
/// other field hangs off, so its absence is a structural failure.
fn assignment_code<'a>(entry: &'a XmlElement, term: &XmlElement, index: usize) -> Result<&'a str> {
    let node = entry.child("hierarchyCode").ok_or_else(|| {
        CatalogueError::structure(&term_label(term, index), "hierarchy assignment has no hierarchyCode")
    })?;
    node.text().ok_or_else(|| {
        CatalogueError::structure(&term_label(term, index), "hierarchy assignment has an empty hierarchyCode")
    })
}

/// Decides whether `code` names the master hierarchy.
fn is_master(code: &str, master: Option<&str>, term: &XmlElement, index: usize) -> Result<bool> {
    match master {
        Some(name) => Ok(code == name),
        None => Err(CatalogueError::structure(
            &term_label(term, index),
            "catalogue metadata has no name, so the master hierarchy cannot be identified",
        )),
    }
}

/// Text of a child that the schema always carries. The element itself must
/// exist; an empty one is a null cell.
fn required_text(
    entry: &XmlElement,
    tag: &str,
    term: &XmlElement,
    index: usize,
) -> Result<Option<String>> {
    entry
        .child(tag)
        .map(|node| node.text().map(str::to_string))
        .ok_or_else(|| {
            CatalogueError::structure(
                &term_label(term, index),
                format!("hierarchy assignment has no {}", tag),
            )
        })
}

fn optional_text(entry: &XmlElement, tag: &str) -> Option<String> {
    entry.child(tag).and_then(XmlElement::text).map(str::to_string)
}

/// Column discovery over all terms. Order matters: every termDesc, then
/// every termVersion, then implicit attribute codes, the fixed master
/// columns and finally per-hierarchy groups.
fn term_columns(terms: &[&XmlElement], master: Option<&str>) -> Result<ColumnSet> {
    let mut columns = ColumnSet::new();

    for section in ["termDesc", "termVersion"] {
        for term in terms {
            for node in term.children_named(section) {
                for field in &node.children {
                    if field.text().is_some() {
                        columns.insert(&field.tag);
                    }
                }
            }
        }
    }

    // The attribute code's value, not its tag, names the column.
    for term in terms {
        for block in term.children_named("implicitAttributes") {
            for code in block.find_all("attributeCode") {
                if let Some(text) = code.text() {
                    columns.insert(text);
                }
            }
        }
    }

    for name in MASTER_COLUMNS {
        columns.insert(name);
    }

    for (index, term) in terms.iter().enumerate() {
        for block in term.children_named("hierarchyAssignments") {
            for entry in &block.children {
                let code = assignment_code(entry, term, index)?;
                if is_master(code, master, term, index)? {
                    continue;
                }
                for suffix in HIERARCHY_SUFFIXES {
                    columns.insert(&secondary_column(code, suffix));
                }
            }
        }
    }

    Ok(columns)
}

fn term_row(term: &XmlElement, index: usize, master: Option<&str>) -> Result<SparseRow> {
    let mut row = SparseRow::new();

    for node in &term.children {
        match node.tag.as_str() {
            "termDesc" | "termVersion" => {
                for field in &node.children {
                    if let Some(text) = field.text() {
                        row.set(field.tag.clone(), Some(text.to_string()));
                    }
                }
            }
            "hierarchyAssignments" => {
                for entry in &node.children {
                    let code = assignment_code(entry, term, index)?;
                    let parent = required_text(entry, "parentCode", term, index)?;
                    let order = required_text(entry, "order", term, index)?;
                    let reportable = optional_text(entry, "reportable");

                    if is_master(code, master, term, index)? {
                        let flag = optional_text(entry, "flag").unwrap_or_else(|| "true".to_string());
                        row.set(MASTER_FLAG, Some(flag));
                        row.set(MASTER_PARENT_CODE, parent);
                        row.set(MASTER_ORDER, order);
                        row.set(MASTER_REPORTABLE, reportable);
                        row.set(MASTER_HIERARCHY_CODE, Some(code.to_string()));
                    } else {
                        row.set(secondary_column(code, PARENT_CODE_SUFFIX), parent);
                        row.set(secondary_column(code, ORDER_SUFFIX), order);
                        row.set(secondary_column(code, REPORTABLE_SUFFIX), reportable);
                        row.set(
                            secondary_column(code, HIERARCHY_CODE_SUFFIX),
                            Some(code.to_string()),
                        );
                    }
                }
            }
            "implicitAttributes" => {
                for entry in &node.children {
                    let (Some(code), Some(value)) =
                        (entry.child("attributeCode"), entry.child("attributeValue"))
                    else {
                        continue;
                    };
                    if let Some(code) = code.text() {
                        row.set(code, value.text().map(str::to_string));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(row)
}
