//! # The quantitation container
//!
//! A [`QuantContainer`] holds a whole quantitation hierarchy as one unit: an
//! ordered set of named assays (raw spectral matches up through aggregated
//! proteins), one shared sample-metadata table, and the [`LinkGraph`] that
//! records which rows produced which.
//!
//! The container is a value. Every operation that would change it returns a
//! new container and leaves the original intact, so independent pipelines
//! can branch from the same starting point without interference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::assay::Assay;
use crate::error::QuantError;
use crate::link::LinkGraph;
use crate::table::{Cell, Column, MetaTable};

/// Ordered assays, shared sample metadata, and inter-assay links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantContainer {
    assays: Vec<(String, Assay)>,
    sample_data: MetaTable,
    links: LinkGraph,
}

impl QuantContainer {
    /// An empty container with no assays and no sample metadata.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_assays(&self) -> usize {
        self.assays.len()
    }

    pub fn assay_names(&self) -> impl Iterator<Item = &str> {
        self.assays.iter().map(|(name, _)| name.as_str())
    }

    pub fn assays(&self) -> impl Iterator<Item = (&str, &Assay)> {
        self.assays.iter().map(|(name, assay)| (name.as_str(), assay))
    }

    pub fn has_assay(&self, name: &str) -> bool {
        self.assays.iter().any(|(n, _)| n == name)
    }

    /// Look up an assay by name.
    pub fn assay(&self, name: &str) -> Result<&Assay, QuantError> {
        self.assays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
            .ok_or_else(|| QuantError::not_found(format!("assay '{name}'")))
    }

    /// Look up an assay by insertion position.
    pub fn assay_at(&self, index: usize) -> Result<&Assay, QuantError> {
        self.assays
            .get(index)
            .map(|(_, a)| a)
            .ok_or_else(|| QuantError::not_found(format!("assay #{index}")))
    }

    pub fn links(&self) -> &LinkGraph {
        &self.links
    }

    pub fn sample_data(&self) -> &MetaTable {
        &self.sample_data
    }

    /// The union of every assay's sample ids, in first-seen order.
    pub fn sample_ids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();
        for (_, assay) in &self.assays {
            for id in assay.sample_ids() {
                if seen.insert(id.clone()) {
                    ids.push(id.clone());
                }
            }
        }
        ids
    }

    /// A new container with `assay` appended under `name`.
    ///
    /// The assay's sample ids must be a subset of the container's shared
    /// sample set. An empty container has no shared set yet; the first
    /// assay seeds it.
    pub fn add_assay(&self, name: &str, assay: Assay) -> Result<QuantContainer, QuantError> {
        if self.has_assay(name) {
            return Err(QuantError::NameCollision(name.to_string()));
        }
        if !self.assays.is_empty() {
            let shared: BTreeSet<&str> = self
                .sample_ids_including_table()
                .into_iter()
                .collect();
            for sample in assay.sample_ids() {
                if !shared.contains(sample.as_str()) {
                    return Err(QuantError::schema(format!(
                        "assay '{name}' introduces unknown sample id '{sample}'"
                    )));
                }
            }
        }
        let mut next = self.clone();
        next.assays.push((name.to_string(), assay));
        Ok(next)
    }

    fn sample_ids_including_table(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        for (_, assay) in &self.assays {
            for id in assay.sample_ids() {
                seen.insert(id.as_str());
            }
        }
        for id in self.sample_data.row_ids() {
            seen.insert(id.as_str());
        }
        seen.into_iter().collect()
    }

    /// Replace the shared sample-metadata table. Its row ids must match the
    /// union of all assay sample ids exactly.
    pub fn set_sample_data(&self, table: MetaTable) -> Result<QuantContainer, QuantError> {
        let expected: BTreeSet<&str> =
            self.assays
                .iter()
                .flat_map(|(_, a)| a.sample_ids())
                .map(String::as_str)
                .collect();
        let provided: BTreeSet<&str> = table.row_ids().iter().map(String::as_str).collect();
        if expected != provided {
            return Err(QuantError::dimension(format!(
                "sample table describes {} samples, assays use {}",
                provided.len(),
                expected.len()
            )));
        }
        let mut next = self.clone();
        next.sample_data = table;
        Ok(next)
    }

    /// Row metadata for the requested assays (all assays when `names` is
    /// `None`), in container order.
    pub fn row_data<'a>(
        &'a self,
        names: Option<&[&'a str]>,
    ) -> Result<Vec<(&'a str, &'a MetaTable)>, QuantError> {
        match names {
            None => Ok(self
                .assays
                .iter()
                .map(|(n, a)| (n.as_str(), a.row_data()))
                .collect()),
            Some(names) => names
                .iter()
                .map(|name| self.assay(name).map(|a| (*name, a.row_data())))
                .collect(),
        }
    }

    /// Left-join partial row-metadata tables onto the named assays.
    ///
    /// For each update: columns present in both are overwritten for matched
    /// row ids, new columns are added, and unmatched rows keep their
    /// current values.
    pub fn set_row_data(
        &self,
        updates: &[(&str, MetaTable)],
    ) -> Result<QuantContainer, QuantError> {
        let mut next = self.clone();
        for (name, update) in updates {
            let position = next
                .assays
                .iter()
                .position(|(n, _)| n == name)
                .ok_or_else(|| QuantError::not_found(format!("assay '{name}'")))?;
            let joined = next.assays[position].1.row_data().left_join(update)?;
            let updated = next.assays[position].1.with_row_data(joined)?;
            next.assays[position].1 = updated;
        }
        Ok(next)
    }

    /// One table of the row-metadata columns common (by name and dtype) to
    /// all named assays, concatenated across rows, with an `assay` column
    /// recording each row's source. A convenience projection.
    pub fn combine_row_data(&self, names: &[&str]) -> Result<MetaTable, QuantError> {
        if names.is_empty() {
            return Err(QuantError::not_found("no assay names given".to_string()));
        }
        let tables: Vec<(&str, &MetaTable)> = names
            .iter()
            .map(|name| self.assay(name).map(|a| (*name, a.row_data())))
            .collect::<Result<_, _>>()?;

        // Columns of the first table that every other table shares, with a
        // matching dtype.
        let (_, first) = tables[0];
        let shared: Vec<(&str, &Column)> = first
            .columns()
            .filter(|(col_name, column)| {
                tables[1..].iter().all(|(_, t)| {
                    t.column(col_name)
                        .is_some_and(|c| c.data_type() == column.data_type())
                })
            })
            .collect();

        let mut row_ids = Vec::new();
        let mut source = Vec::new();
        for (assay_name, table) in &tables {
            for id in table.row_ids() {
                row_ids.push(id.clone());
                source.push(Some(assay_name.to_string()));
            }
        }

        let mut columns: Vec<(String, Column)> =
            vec![("assay".to_string(), Column::Str(source))];
        for (col_name, template) in shared {
            let mut merged = template.missing_like(0);
            for (_, table) in &tables {
                merged = append_column(merged, table.column(col_name).unwrap_or(template));
            }
            columns.push((col_name.to_string(), merged));
        }
        MetaTable::with_columns(row_ids, columns)
    }

    /// Flatten the container to long form: one row per
    /// (assay, feature, sample, value), plus the requested row-metadata
    /// columns. A pure projection for downstream tabular consumption.
    ///
    /// Every requested row var must exist, with one dtype, in every
    /// included assay.
    pub fn long_form(
        &self,
        names: Option<&[&str]>,
        row_vars: &[&str],
    ) -> Result<MetaTable, QuantError> {
        let selected: Vec<(&str, &Assay)> = match names {
            None => self.assays().collect(),
            Some(names) => names
                .iter()
                .map(|name| self.assay(name).map(|a| (*name, a)))
                .collect::<Result<_, _>>()?,
        };

        for var in row_vars {
            for (assay_name, assay) in &selected {
                if !assay.row_data().has_column(var) {
                    return Err(QuantError::MissingColumn(format!(
                        "row var '{var}' is absent from assay '{assay_name}'"
                    )));
                }
            }
        }

        let mut row_ids = Vec::new();
        let mut assay_col = Vec::new();
        let mut feature_col = Vec::new();
        let mut sample_col = Vec::new();
        let mut value_col = Vec::new();
        let mut var_cols: Vec<Vec<Option<String>>> = vec![Vec::new(); row_vars.len()];

        for (assay_name, assay) in &selected {
            for (r, feature) in assay.row_ids().iter().enumerate() {
                let values = assay.row_values(r);
                for (c, sample) in assay.sample_ids().iter().enumerate() {
                    row_ids.push(format!("{assay_name}:{feature}:{sample}"));
                    assay_col.push(Some(assay_name.to_string()));
                    feature_col.push(Some(feature.clone()));
                    sample_col.push(Some(sample.clone()));
                    value_col.push(values[c]);
                    for (v, var) in row_vars.iter().enumerate() {
                        let cell = assay
                            .row_data()
                            .column(var)
                            .map(|col| col.cell(r))
                            .unwrap_or(Cell::Missing);
                        var_cols[v].push(match cell {
                            Cell::Missing => None,
                            other => Some(other.render()),
                        });
                    }
                }
            }
        }

        let mut columns: Vec<(String, Column)> = vec![
            ("assay".to_string(), Column::Str(assay_col)),
            ("feature_id".to_string(), Column::Str(feature_col)),
            ("sample_id".to_string(), Column::Str(sample_col)),
            ("value".to_string(), Column::Float(value_col)),
        ];
        for (v, var) in row_vars.iter().enumerate() {
            columns.push((var.to_string(), Column::Str(std::mem::take(&mut var_cols[v]))));
        }
        MetaTable::with_columns(row_ids, columns)
    }

    /// A container with the same sample metadata but new assay and link
    /// contents. Used by the filter and subset engines.
    pub(crate) fn derived(
        &self,
        assays: Vec<(String, Assay)>,
        links: LinkGraph,
    ) -> QuantContainer {
        QuantContainer {
            assays,
            sample_data: self.sample_data.clone(),
            links,
        }
    }

    /// Append an aggregated assay together with its provenance edge. Used
    /// by the aggregation engine after both have been validated.
    pub(crate) fn with_aggregated(
        &self,
        name: &str,
        assay: Assay,
        link: crate::link::AssayLink,
    ) -> Result<QuantContainer, QuantError> {
        let mut next = self.add_assay(name, assay)?;
        next.links.add_edge(link)?;
        Ok(next)
    }
}

fn append_column(mut accumulator: Column, next: &Column) -> Column {
    match (&mut accumulator, next) {
        (Column::Str(dst), Column::Str(src)) => dst.extend(src.iter().cloned()),
        (Column::Float(dst), Column::Float(src)) => dst.extend(src.iter().copied()),
        (Column::Int(dst), Column::Int(src)) => dst.extend(src.iter().copied()),
        (Column::Bool(dst), Column::Bool(src)) => dst.extend(src.iter().copied()),
        _ => {}
    }
    accumulator
}
