//! # Typed row-metadata tables
//!
//! Row metadata in a quantitation hierarchy is heterogeneous: peptide
//! sequences and protein accessions are strings, identification scores are
//! floats, charge states are integers, decoy flags are booleans. This module
//! models such a table as an ordered mapping from column name to a typed
//! column container, indexed by a shared row-id vector. The schema is
//! validated at construction; there is no runtime attribute dispatch.
//!
//! Tables are values: subsetting and joining produce new tables and never
//! mutate one that another owner may still reference.

use serde::{Deserialize, Serialize};

use crate::error::QuantError;

/// The element type of one metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Str,
    Float,
    Int,
    Bool,
}

/// One typed metadata column with per-cell missingness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Str(Vec<Option<String>>),
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
}

/// A borrowed view of one cell, missing or typed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Str(&'a str),
    Float(f64),
    Int(i64),
    Bool(bool),
    Missing,
}

impl Cell<'_> {
    /// Render the cell for display and export; missing cells render empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Str(s) => (*s).to_string(),
            Cell::Float(v) => format!("{v}"),
            Cell::Int(v) => format!("{v}"),
            Cell::Bool(v) => format!("{v}"),
            Cell::Missing => String::new(),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl Column {
    pub fn data_type(&self) -> DataType {
        match self {
            Column::Str(_) => DataType::Str,
            Column::Float(_) => DataType::Float,
            Column::Int(_) => DataType::Int,
            Column::Bool(_) => DataType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Str(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the cell at `index`; out-of-range reads as missing.
    pub fn cell(&self, index: usize) -> Cell<'_> {
        match self {
            Column::Str(v) => match v.get(index) {
                Some(Some(s)) => Cell::Str(s),
                _ => Cell::Missing,
            },
            Column::Float(v) => match v.get(index) {
                Some(Some(x)) => Cell::Float(*x),
                _ => Cell::Missing,
            },
            Column::Int(v) => match v.get(index) {
                Some(Some(x)) => Cell::Int(*x),
                _ => Cell::Missing,
            },
            Column::Bool(v) => match v.get(index) {
                Some(Some(x)) => Cell::Bool(*x),
                _ => Cell::Missing,
            },
        }
    }

    /// A new column holding the cells at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Column {
        fn pick<T: Clone>(v: &[Option<T>], indices: &[usize]) -> Vec<Option<T>> {
            indices.iter().map(|&i| v.get(i).cloned().flatten()).collect()
        }
        match self {
            Column::Str(v) => Column::Str(pick(v, indices)),
            Column::Float(v) => Column::Float(pick(v, indices)),
            Column::Int(v) => Column::Int(pick(v, indices)),
            Column::Bool(v) => Column::Bool(pick(v, indices)),
        }
    }

    /// An all-missing column of this dtype with `len` cells.
    pub fn missing_like(&self, len: usize) -> Column {
        match self.data_type() {
            DataType::Str => Column::Str(vec![None; len]),
            DataType::Float => Column::Float(vec![None; len]),
            DataType::Int => Column::Int(vec![None; len]),
            DataType::Bool => Column::Bool(vec![None; len]),
        }
    }

    /// Copy the cell at `from` in `source` into `self` at `to`.
    ///
    /// Both columns must share a dtype; callers check this up front.
    pub(crate) fn copy_cell(&mut self, to: usize, source: &Column, from: usize) {
        match (self, source) {
            (Column::Str(dst), Column::Str(src)) => dst[to] = src[from].clone(),
            (Column::Float(dst), Column::Float(src)) => dst[to] = src[from],
            (Column::Int(dst), Column::Int(src)) => dst[to] = src[from],
            (Column::Bool(dst), Column::Bool(src)) => dst[to] = src[from],
            _ => {}
        }
    }
}

/// An ordered collection of typed columns over a shared row-id vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTable {
    row_ids: Vec<String>,
    columns: Vec<(String, Column)>,
}

impl MetaTable {
    /// A table with row ids and no columns yet.
    pub fn new(row_ids: Vec<String>) -> Self {
        Self {
            row_ids,
            columns: Vec::new(),
        }
    }

    /// Build a table and validate the schema: every column must have exactly
    /// one cell per row id, and column names must be unique.
    pub fn with_columns(
        row_ids: Vec<String>,
        columns: Vec<(String, Column)>,
    ) -> Result<Self, QuantError> {
        for (name, column) in &columns {
            if column.len() != row_ids.len() {
                return Err(QuantError::dimension(format!(
                    "column '{}' has {} cells for {} rows",
                    name,
                    column.len(),
                    row_ids.len()
                )));
            }
        }
        for (i, (name, _)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(QuantError::schema(format!("duplicate column name '{name}'")));
            }
        }
        Ok(Self { row_ids, columns })
    }

    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Position of a row id, scanning in table order.
    pub fn position(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|id| id == row_id)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Append a column; replaces any existing column with the same name.
    pub fn set_column(&mut self, name: &str, column: Column) -> Result<(), QuantError> {
        if column.len() != self.row_ids.len() {
            return Err(QuantError::dimension(format!(
                "column '{}' has {} cells for {} rows",
                name,
                column.len(),
                self.row_ids.len()
            )));
        }
        if let Some(position) = self.columns.iter().position(|(n, _)| n == name) {
            self.columns[position].1 = column;
        } else {
            self.columns.push((name.to_string(), column));
        }
        Ok(())
    }

    /// A new table keeping the rows at `indices`, in that order.
    pub fn subset_rows(&self, indices: &[usize]) -> MetaTable {
        let row_ids = indices
            .iter()
            .filter_map(|&i| self.row_ids.get(i).cloned())
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.subset(indices)))
            .collect();
        MetaTable { row_ids, columns }
    }

    /// Left-join `updates` onto this table by row id.
    ///
    /// Columns present in both tables are overwritten cell-by-cell for the
    /// matched rows (dtypes must agree), columns only in `updates` are added
    /// with missing cells for unmatched rows, and rows of this table that
    /// `updates` does not mention are left unchanged.
    pub fn left_join(&self, updates: &MetaTable) -> Result<MetaTable, QuantError> {
        for (name, incoming) in &updates.columns {
            if let Some(existing) = self.column(name) {
                if existing.data_type() != incoming.data_type() {
                    return Err(QuantError::schema(format!(
                        "column '{}' is {:?} here but {:?} in the update",
                        name,
                        existing.data_type(),
                        incoming.data_type()
                    )));
                }
            }
        }

        let matches: Vec<(usize, usize)> = updates
            .row_ids
            .iter()
            .enumerate()
            .filter_map(|(from, id)| self.position(id).map(|to| (to, from)))
            .collect();

        let mut joined = self.clone();
        for (name, incoming) in &updates.columns {
            let mut target = match joined.column(name) {
                Some(existing) => existing.clone(),
                None => incoming.missing_like(joined.n_rows()),
            };
            for &(to, from) in &matches {
                target.copy_cell(to, incoming, from);
            }
            joined.set_column(name, target)?;
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> MetaTable {
        MetaTable::with_columns(
            vec!["psm1".into(), "psm2".into(), "psm3".into()],
            vec![
                (
                    "sequence".into(),
                    Column::Str(vec![
                        Some("PEPTIDE".into()),
                        Some("PEPTIDE".into()),
                        Some("ELVISK".into()),
                    ]),
                ),
                (
                    "score".into(),
                    Column::Float(vec![Some(0.9), Some(0.7), None]),
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_validated_at_construction() {
        let short = Column::Float(vec![Some(1.0)]);
        let err = MetaTable::with_columns(
            vec!["a".into(), "b".into()],
            vec![("x".into(), short)],
        )
        .unwrap_err();
        assert!(matches!(err, QuantError::Dimension(_)));

        let err = MetaTable::with_columns(
            vec!["a".into()],
            vec![
                ("x".into(), Column::Int(vec![Some(1)])),
                ("x".into(), Column::Int(vec![Some(2)])),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, QuantError::Schema(_)));
    }

    #[test]
    fn test_subset_rows_reorders_and_copies() {
        let table = scores();
        let sub = table.subset_rows(&[2, 0]);
        assert_eq!(sub.row_ids(), ["psm3".to_string(), "psm1".to_string()]);
        assert_eq!(sub.column("score").unwrap().cell(1), Cell::Float(0.9));
        // original untouched
        assert_eq!(table.n_rows(), 3);
    }

    #[test]
    fn test_left_join_overwrites_and_extends() {
        let table = scores();
        let updates = MetaTable::with_columns(
            vec!["psm3".into(), "psm9".into()],
            vec![
                ("score".into(), Column::Float(vec![Some(0.5), Some(0.1)])),
                (
                    "protein".into(),
                    Column::Str(vec![Some("P12345".into()), Some("P99999".into())]),
                ),
            ],
        )
        .unwrap();

        let joined = table.left_join(&updates).unwrap();
        // matched row overwritten, unmatched rows untouched
        assert_eq!(joined.column("score").unwrap().cell(2), Cell::Float(0.5));
        assert_eq!(joined.column("score").unwrap().cell(0), Cell::Float(0.9));
        // new column added, missing where the update had no row
        assert_eq!(
            joined.column("protein").unwrap().cell(2),
            Cell::Str("P12345")
        );
        assert!(joined.column("protein").unwrap().cell(0).is_missing());
        // update row with no match is ignored
        assert_eq!(joined.n_rows(), 3);
    }

    #[test]
    fn test_left_join_rejects_dtype_change() {
        let table = scores();
        let updates = MetaTable::with_columns(
            vec!["psm1".into()],
            vec![("score".into(), Column::Str(vec![Some("high".into())]))],
        )
        .unwrap();
        assert!(matches!(
            table.left_join(&updates),
            Err(QuantError::Schema(_))
        ));
    }
}
