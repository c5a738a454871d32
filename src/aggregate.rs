//! # Aggregation engine
//!
//! Builds a new assay from an existing one by grouping rows on a metadata
//! column and combining each group's intensities per sample. The engine
//! records an [`AssayLink`](crate::link::AssayLink) from every group row
//! back to the source rows that fed it, so calls can be chained (spectral
//! matches to peptides to proteins) while the link graph accumulates the
//! transitive provenance.
//!
//! ## Shared evidence
//!
//! A group-key cell may name several groups at once, delimited by `;`
//! (a peptide assigned to two protein groups). Such a row contributes its
//! full values to every named group. This duplication is deliberate:
//! exclusive partitioning would change the aggregate values.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::assay::Assay;
use crate::container::QuantContainer;
use crate::error::QuantError;
use crate::link::AssayLink;
use crate::table::{Column, MetaTable};

/// Delimiter separating multiple group memberships inside one key cell.
pub const MEMBERSHIP_DELIMITER: char = ';';

/// Marker written to a string metadata column when a group's values were
/// not uniform and had to be collapsed.
pub const COLLAPSED_MARKER: &str = "<collapsed>";

/// Built-in per-sample reductions over a group's non-missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    /// Arithmetic mean; missing when the group has no values.
    Mean,
    /// Sum; missing when the group has no values.
    Sum,
    /// Median; missing when the group has no values.
    Median,
    /// Count of non-missing values; zero when the group has none.
    Count,
}

impl Reducer {
    /// Combine one group's non-missing values for one sample.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        match self {
            Reducer::Count => Some(values.len() as f64),
            _ if values.is_empty() => None,
            Reducer::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Reducer::Sum => Some(values.iter().sum()),
            Reducer::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 1 {
                    Some(sorted[mid])
                } else {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                }
            }
        }
    }
}

/// Aggregate `source` by `group_by` using a built-in [`Reducer`], adding
/// the result under `new_name`.
pub fn aggregate(
    container: &QuantContainer,
    source: &str,
    group_by: &str,
    new_name: &str,
    reducer: Reducer,
) -> Result<QuantContainer, QuantError> {
    aggregate_with(container, source, group_by, new_name, |values| {
        reducer.reduce(values)
    })
}

/// Aggregate with an arbitrary reduction closure over each group's
/// non-missing values for one sample. The closure must be deterministic
/// and order-independent over the value multiset.
///
/// Fails with `MissingColumn` when `group_by` is absent from the source
/// assay's row metadata, and `NameCollision` when `new_name` is taken.
pub fn aggregate_with<F>(
    container: &QuantContainer,
    source: &str,
    group_by: &str,
    new_name: &str,
    reduce_fn: F,
) -> Result<QuantContainer, QuantError>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let source_assay = container.assay(source)?;
    let key_column = source_assay.row_data().column(group_by).ok_or_else(|| {
        QuantError::MissingColumn(format!(
            "grouping column '{group_by}' is absent from assay '{source}'"
        ))
    })?;

    // Partition rows into groups, in order of first appearance. A key cell
    // naming several memberships assigns the row to each of them; a missing
    // key cell assigns the row to none.
    let mut keys: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for row in 0..source_assay.n_rows() {
        let cell = key_column.cell(row);
        if cell.is_missing() {
            continue;
        }
        let rendered = cell.render();
        for key in rendered.split(MEMBERSHIP_DELIMITER) {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let slot = *index.entry(key.to_string()).or_insert_with(|| {
                keys.push(key.to_string());
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }
    }
    debug!(
        "aggregating '{source}' by '{group_by}': {} rows into {} groups",
        source_assay.n_rows(),
        keys.len()
    );

    // Reduce each (group, sample) cell over the group's non-missing values.
    let n_samples = source_assay.n_samples();
    let values: Vec<Vec<Option<f64>>> = groups
        .iter()
        .map(|members| {
            (0..n_samples)
                .map(|sample| {
                    let observed: Vec<f64> = members
                        .iter()
                        .filter_map(|&row| source_assay.row_values(row)[sample])
                        .collect();
                    reduce_fn(&observed)
                })
                .collect()
        })
        .collect();

    // Collapse the remaining metadata columns: keep a value when it is
    // uniform within the group, otherwise mark the cell collapsed.
    let mut columns: Vec<(String, Column)> = vec![
        (
            group_by.to_string(),
            Column::Str(keys.iter().map(|k| Some(k.clone())).collect()),
        ),
        (
            "n_features".to_string(),
            Column::Int(groups.iter().map(|g| Some(g.len() as i64)).collect()),
        ),
    ];
    for (name, column) in source_assay.row_data().columns() {
        if name == group_by || name == "n_features" {
            continue;
        }
        columns.push((name.to_string(), collapse_column(column, &groups)));
    }
    let row_data = MetaTable::with_columns(keys.clone(), columns)?;
    let assay = Assay::new(source_assay.sample_ids().to_vec(), values, row_data)?;

    // Provenance: every group row maps to the source rows that fed it.
    let mapping: BTreeMap<String, BTreeSet<String>> = keys
        .iter()
        .zip(&groups)
        .map(|(key, members)| {
            (
                key.clone(),
                members
                    .iter()
                    .map(|&row| source_assay.row_ids()[row].clone())
                    .collect(),
            )
        })
        .collect();
    let link = AssayLink::new(source, new_name, mapping);

    container.with_aggregated(new_name, assay, link)
}

/// Per-group uniform value, or `None` when the group disagrees.
fn uniform<T: PartialEq + Clone>(cells: &[Option<T>], members: &[usize]) -> Result<Option<T>, ()> {
    let mut iter = members.iter().map(|&i| &cells[i]);
    let first = match iter.next() {
        Some(first) => first,
        None => return Ok(None),
    };
    if iter.all(|cell| cell == first) {
        Ok(first.clone())
    } else {
        Err(())
    }
}

fn collapse_column(column: &Column, groups: &[Vec<usize>]) -> Column {
    match column {
        Column::Str(cells) => Column::Str(
            groups
                .iter()
                .map(|members| match uniform(cells, members) {
                    Ok(cell) => cell,
                    Err(()) => Some(COLLAPSED_MARKER.to_string()),
                })
                .collect(),
        ),
        Column::Float(cells) => Column::Float(
            groups
                .iter()
                .map(|members| uniform(cells, members).unwrap_or(None))
                .collect(),
        ),
        Column::Int(cells) => Column::Int(
            groups
                .iter()
                .map(|members| uniform(cells, members).unwrap_or(None))
                .collect(),
        ),
        Column::Bool(cells) => Column::Bool(
            groups
                .iter()
                .map(|members| uniform(cells, members).unwrap_or(None))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn psm_container() -> QuantContainer {
        let row_data = MetaTable::with_columns(
            vec!["psm1".into(), "psm2".into(), "psm3".into(), "psm4".into()],
            vec![
                (
                    "sequence".into(),
                    Column::Str(vec![
                        Some("PEPTIDE".into()),
                        Some("PEPTIDE".into()),
                        Some("ELVISK".into()),
                        None,
                    ]),
                ),
                (
                    "protein".into(),
                    Column::Str(vec![
                        Some("P1".into()),
                        Some("P1;P2".into()),
                        Some("P2".into()),
                        Some("P3".into()),
                    ]),
                ),
                (
                    "charge".into(),
                    Column::Int(vec![Some(2), Some(3), Some(2), Some(2)]),
                ),
            ],
        )
        .unwrap();
        let assay = Assay::new(
            vec!["s1".into(), "s2".into()],
            vec![
                vec![Some(2.0), Some(10.0)],
                vec![Some(4.0), None],
                vec![Some(6.0), Some(20.0)],
                vec![Some(8.0), Some(30.0)],
            ],
            row_data,
        )
        .unwrap();
        QuantContainer::new().add_assay("psms", assay).unwrap()
    }

    #[test]
    fn test_mean_aggregation_and_missing_handling() {
        let container = psm_container();
        let next = aggregate(&container, "psms", "sequence", "peptides", Reducer::Mean).unwrap();

        let peptides = next.assay("peptides").unwrap();
        // psm4 has no sequence and joins no group
        assert_eq!(peptides.n_rows(), 2);
        assert_eq!(peptides.value("PEPTIDE", "s1"), Some(3.0));
        // the missing cell is excluded, not treated as zero
        assert_eq!(peptides.value("PEPTIDE", "s2"), Some(10.0));
        assert_eq!(peptides.value("ELVISK", "s2"), Some(20.0));
        // the input container is untouched
        assert_eq!(container.n_assays(), 1);
    }

    #[test]
    fn test_shared_membership_contributes_to_every_group() {
        let container = psm_container();
        let next = aggregate(&container, "psms", "protein", "proteins", Reducer::Sum).unwrap();
        let proteins = next.assay("proteins").unwrap();

        assert_eq!(proteins.n_rows(), 3);
        // psm2 (P1;P2) contributes fully to both P1 and P2
        assert_eq!(proteins.value("P1", "s1"), Some(6.0));
        assert_eq!(proteins.value("P2", "s1"), Some(10.0));
        assert_eq!(proteins.value("P3", "s1"), Some(8.0));

        let link = next.links().parent_edge("proteins").unwrap();
        assert!(link.parents_of("P1").unwrap().contains("psm2"));
        assert!(link.parents_of("P2").unwrap().contains("psm2"));
    }

    #[test]
    fn test_collapsed_metadata_and_counts() {
        let container = psm_container();
        let next = aggregate(&container, "psms", "sequence", "peptides", Reducer::Median).unwrap();
        let row_data = next.assay("peptides").unwrap().row_data();

        assert_eq!(
            row_data.column("n_features").unwrap().cell(0),
            Cell::Int(2)
        );
        // charge differs within PEPTIDE: collapsed to missing for an Int column
        assert!(row_data.column("charge").unwrap().cell(0).is_missing());
        assert_eq!(row_data.column("charge").unwrap().cell(1), Cell::Int(2));
        // protein differs within PEPTIDE: marked in a Str column
        assert_eq!(
            row_data.column("protein").unwrap().cell(0),
            Cell::Str(COLLAPSED_MARKER)
        );
    }

    #[test]
    fn test_count_reducer_counts_non_missing() {
        let container = psm_container();
        let next = aggregate(&container, "psms", "sequence", "peptides", Reducer::Count).unwrap();
        let peptides = next.assay("peptides").unwrap();
        assert_eq!(peptides.value("PEPTIDE", "s1"), Some(2.0));
        assert_eq!(peptides.value("PEPTIDE", "s2"), Some(1.0));
    }

    #[test]
    fn test_aggregate_errors() {
        let container = psm_container();
        assert!(matches!(
            aggregate(&container, "psms", "nope", "x", Reducer::Mean),
            Err(QuantError::MissingColumn(_))
        ));
        assert!(matches!(
            aggregate(&container, "psms", "sequence", "psms", Reducer::Mean),
            Err(QuantError::NameCollision(_))
        ));
        assert!(matches!(
            aggregate(&container, "nope", "sequence", "x", Reducer::Mean),
            Err(QuantError::NotFound(_))
        ));
    }

    #[test]
    fn test_chained_aggregation_accumulates_links() {
        let container = psm_container();
        let next = aggregate(&container, "psms", "sequence", "peptides", Reducer::Mean).unwrap();
        let next = aggregate(&next, "peptides", "protein", "proteins", Reducer::Mean).unwrap();
        assert_eq!(next.links().edges().len(), 2);
        // PEPTIDE's protein column collapsed, so it lands in the marker group
        let proteins = next.assay("proteins").unwrap();
        assert!(proteins.has_row(COLLAPSED_MARKER));
    }
}
