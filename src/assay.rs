//! # Assays
//!
//! An [`Assay`] is one rectangular quantitation table: rows are features
//! (spectral matches, peptides, proteins), columns are samples, cells are
//! optional intensities. Each assay carries its own row-metadata table whose
//! row ids are, by construction, exactly the matrix row ids in the same
//! order.
//!
//! Assays are immutable in row and column identity once created; row
//! subsetting and metadata replacement build new values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::QuantError;
use crate::table::MetaTable;

/// One quantitation matrix plus its row metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assay {
    sample_ids: Vec<String>,
    /// Row-major intensity matrix; `values[r]` has one slot per sample id.
    values: Vec<Vec<Option<f64>>>,
    row_data: MetaTable,
}

impl Assay {
    /// Build an assay and validate its identity invariants: one value row
    /// per metadata row, one cell per sample, and no duplicate row or
    /// sample ids.
    pub fn new(
        sample_ids: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
        row_data: MetaTable,
    ) -> Result<Self, QuantError> {
        if values.len() != row_data.n_rows() {
            return Err(QuantError::dimension(format!(
                "{} value rows for {} metadata rows",
                values.len(),
                row_data.n_rows()
            )));
        }
        for (i, row) in values.iter().enumerate() {
            if row.len() != sample_ids.len() {
                return Err(QuantError::dimension(format!(
                    "row '{}' has {} values for {} samples",
                    row_data.row_ids()[i],
                    row.len(),
                    sample_ids.len()
                )));
            }
        }
        let mut seen = HashSet::new();
        for id in row_data.row_ids() {
            if !seen.insert(id.as_str()) {
                return Err(QuantError::schema(format!("duplicate row id '{id}'")));
            }
        }
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(QuantError::schema(format!("duplicate sample id '{id}'")));
            }
        }
        Ok(Self {
            sample_ids,
            values,
            row_data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn row_ids(&self) -> &[String] {
        self.row_data.row_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn row_data(&self) -> &MetaTable {
        &self.row_data
    }

    pub fn has_row(&self, row_id: &str) -> bool {
        self.row_data.position(row_id).is_some()
    }

    pub fn position(&self, row_id: &str) -> Option<usize> {
        self.row_data.position(row_id)
    }

    /// Intensities for one feature, one slot per sample.
    pub fn row_values(&self, index: usize) -> &[Option<f64>] {
        &self.values[index]
    }

    /// The cell at (row id, sample id), if both exist and the cell is set.
    pub fn value(&self, row_id: &str, sample_id: &str) -> Option<f64> {
        let r = self.position(row_id)?;
        let c = self.sample_ids.iter().position(|s| s == sample_id)?;
        self.values[r][c]
    }

    /// A new assay whose row metadata has been replaced wholesale.
    ///
    /// The replacement must describe exactly the current rows, in order.
    pub fn with_row_data(&self, row_data: MetaTable) -> Result<Assay, QuantError> {
        if row_data.row_ids() != self.row_data.row_ids() {
            return Err(QuantError::dimension(
                "replacement row metadata does not match the assay's row ids".to_string(),
            ));
        }
        Ok(Assay {
            sample_ids: self.sample_ids.clone(),
            values: self.values.clone(),
            row_data,
        })
    }

    /// A new assay keeping the rows at `indices`, in that order. Sample
    /// identity is unchanged.
    pub fn subset_rows(&self, indices: &[usize]) -> Assay {
        Assay {
            sample_ids: self.sample_ids.clone(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
            row_data: self.row_data.subset_rows(indices),
        }
    }

    /// A new assay keeping only the rows whose id is in `keep`, preserving
    /// this assay's row order.
    pub fn retain_rows(&self, keep: &HashSet<&str>) -> Assay {
        let indices: Vec<usize> = self
            .row_ids()
            .iter()
            .enumerate()
            .filter(|(_, id)| keep.contains(id.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.subset_rows(&indices)
    }
}
