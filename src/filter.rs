//! # Filter engine
//!
//! Filters drop rows by row-metadata attribute, independently in every
//! assay that carries the attribute. Assays without the filtered field are
//! left completely untouched; absence is neither an error nor "no match".
//! After the rows are gone, the link graph is restricted to the survivors
//! so the hierarchy stays consistent.
//!
//! A filter is a conjunction of `(field, operator, value)` predicates,
//! built directly or parsed from a small declarative expression syntax:
//!
//! ```text
//! score >= 0.75 & organism == "human" & charge in (2, 3)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::assay::Assay;
use crate::container::QuantContainer;
use crate::error::QuantError;
use crate::table::Cell;

/// Comparison operator of one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Set membership against a list of rendered values.
    In,
}

/// Comparison value of one predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Str(String),
    Number(f64),
    Bool(bool),
    /// Membership list for [`FilterOp::In`], matched against the rendered
    /// cell text.
    Set(Vec<String>),
}

/// One attribute predicate. Rows whose cell is missing never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Evaluate against one cell. Missing cells fail every operator, and a
    /// type-incompatible comparison fails everything except `Ne`.
    pub fn matches(&self, cell: Cell<'_>) -> bool {
        if cell.is_missing() {
            return false;
        }
        match self.op {
            FilterOp::In => {
                let rendered = cell.render();
                match &self.value {
                    FilterValue::Set(members) => members.iter().any(|m| *m == rendered),
                    _ => false,
                }
            }
            FilterOp::Eq => compare(cell, &self.value) == Some(std::cmp::Ordering::Equal),
            FilterOp::Ne => compare(cell, &self.value) != Some(std::cmp::Ordering::Equal),
            FilterOp::Lt => compare(cell, &self.value) == Some(std::cmp::Ordering::Less),
            FilterOp::Le => matches!(
                compare(cell, &self.value),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            FilterOp::Gt => compare(cell, &self.value) == Some(std::cmp::Ordering::Greater),
            FilterOp::Ge => matches!(
                compare(cell, &self.value),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
        }
    }
}

fn compare(cell: Cell<'_>, value: &FilterValue) -> Option<std::cmp::Ordering> {
    match (cell, value) {
        (Cell::Str(s), FilterValue::Str(v)) => Some(s.cmp(v.as_str())),
        (Cell::Float(x), FilterValue::Number(v)) => x.partial_cmp(v),
        (Cell::Int(x), FilterValue::Number(v)) => (x as f64).partial_cmp(v),
        (Cell::Bool(x), FilterValue::Bool(v)) => Some(x.cmp(v)),
        _ => None,
    }
}

/// A conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
}

impl FilterSet {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Parse a conjunction from a declarative expression string. Clauses
    /// are separated by `&`; each clause is `field op value` with the
    /// operators `==`, `!=`, `<=`, `>=`, `<`, `>`, and `in (a, b, ...)`.
    /// Values may be quoted strings, numbers, `true`/`false`, or bare
    /// words.
    pub fn parse(expression: &str) -> Result<Self, QuantError> {
        let predicates = expression
            .split('&')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        if predicates.is_empty() {
            return Err(QuantError::InvalidFilter(
                "empty filter expression".to_string(),
            ));
        }
        Ok(Self { predicates })
    }
}

fn parse_clause(clause: &str) -> Result<Predicate, QuantError> {
    let invalid = |message: String| QuantError::InvalidFilter(message);

    let field_end = clause
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .ok_or_else(|| invalid(format!("clause '{clause}' has no operator")))?;
    let field = &clause[..field_end];
    if field.is_empty() {
        return Err(invalid(format!("clause '{clause}' has no field name")));
    }
    let rest = clause[field_end..].trim_start();

    let (op, rest) = if let Some(rest) = rest.strip_prefix("==") {
        (FilterOp::Eq, rest)
    } else if let Some(rest) = rest.strip_prefix("!=") {
        (FilterOp::Ne, rest)
    } else if let Some(rest) = rest.strip_prefix("<=") {
        (FilterOp::Le, rest)
    } else if let Some(rest) = rest.strip_prefix(">=") {
        (FilterOp::Ge, rest)
    } else if let Some(rest) = rest.strip_prefix('<') {
        (FilterOp::Lt, rest)
    } else if let Some(rest) = rest.strip_prefix('>') {
        (FilterOp::Gt, rest)
    } else if let Some(rest) = rest.strip_prefix("in") {
        (FilterOp::In, rest)
    } else {
        return Err(invalid(format!("clause '{clause}' has no valid operator")));
    };

    let raw = rest.trim();
    if raw.is_empty() {
        return Err(invalid(format!("clause '{clause}' has no value")));
    }

    let value = if op == FilterOp::In {
        let inner = raw
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| invalid(format!("'in' value in '{clause}' must be parenthesized")))?;
        let mut members = Vec::new();
        for item in inner.split(',') {
            let item = unquote(item.trim())?;
            if !item.is_empty() {
                members.push(item.to_string());
            }
        }
        FilterValue::Set(members)
    } else if raw.starts_with('"')
        || raw.starts_with('\'')
        || raw.ends_with('"')
        || raw.ends_with('\'')
    {
        FilterValue::Str(unquote(raw)?.to_string())
    } else if raw == "true" || raw == "false" {
        FilterValue::Bool(raw == "true")
    } else if let Ok(number) = raw.parse::<f64>() {
        FilterValue::Number(number)
    } else {
        FilterValue::Str(raw.to_string())
    };

    Ok(Predicate::new(field, op, value))
}

/// Strip one pair of matching quotes; quotes that open without closing
/// (or close without opening) are rejected.
fn unquote(raw: &str) -> Result<&str, QuantError> {
    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            return rest.strip_suffix(quote).ok_or_else(|| {
                QuantError::InvalidFilter(format!("unbalanced quotes in '{raw}'"))
            });
        }
        if raw.ends_with(quote) {
            return Err(QuantError::InvalidFilter(format!(
                "unbalanced quotes in '{raw}'"
            )));
        }
    }
    Ok(raw)
}

/// Apply a conjunction of predicates to every assay that carries the
/// filtered fields, restrict the link graph to the surviving rows, and
/// return the filtered container. The input is never mutated; emptying an
/// assay entirely is a legitimate outcome.
pub fn apply_filter(container: &QuantContainer, filters: &FilterSet) -> QuantContainer {
    let mut assays: Vec<(String, Assay)> = container
        .assays()
        .map(|(name, assay)| (name.to_string(), assay.clone()))
        .collect();

    for predicate in filters.predicates() {
        for (_, assay) in assays.iter_mut() {
            let column = match assay.row_data().column(&predicate.field) {
                Some(column) => column.clone(),
                // Assays without the field stay untouched for this predicate.
                None => continue,
            };
            let keep: Vec<usize> = (0..assay.n_rows())
                .filter(|&row| predicate.matches(column.cell(row)))
                .collect();
            if keep.len() != assay.n_rows() {
                *assay = assay.subset_rows(&keep);
            }
        }
    }

    let surviving: HashMap<String, HashSet<String>> = assays
        .iter()
        .map(|(name, assay)| (name.clone(), assay.row_ids().iter().cloned().collect()))
        .collect();
    let links = container.links().restricted(&surviving);
    container.derived(assays, links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Reducer};
    use crate::table::{Column, MetaTable};

    fn container() -> QuantContainer {
        let row_data = MetaTable::with_columns(
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
                    Column::Float(vec![Some(0.9), Some(0.4), None]),
                ),
                ("charge".into(), Column::Int(vec![Some(2), Some(3), Some(2)])),
            ],
        )
        .unwrap();
        let assay = Assay::new(
            vec!["s1".into()],
            vec![vec![Some(1.0)], vec![Some(2.0)], vec![Some(3.0)]],
            row_data,
        )
        .unwrap();
        let container = QuantContainer::new().add_assay("psms", assay).unwrap();
        aggregate(&container, "psms", "sequence", "peptides", Reducer::Mean).unwrap()
    }

    #[test]
    fn test_parse_expression() {
        let filters =
            FilterSet::parse(r#"score >= 0.75 & sequence == "PEPTIDE" & charge in (2, 3)"#)
                .unwrap();
        assert_eq!(filters.predicates().len(), 3);
        assert_eq!(
            filters.predicates()[0],
            Predicate::new("score", FilterOp::Ge, FilterValue::Number(0.75))
        );
        assert_eq!(
            filters.predicates()[2],
            Predicate::new(
                "charge",
                FilterOp::In,
                FilterValue::Set(vec!["2".into(), "3".into()])
            )
        );

        assert!(matches!(
            FilterSet::parse("score ~ 3"),
            Err(QuantError::InvalidFilter(_))
        ));
        assert!(matches!(
            FilterSet::parse(""),
            Err(QuantError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unbalanced_quotes() {
        for expression in [
            r#"organism == "human'"#,
            r#"organism == "human"#,
            "organism == human'",
            r#"charge in (2, "3')"#,
        ] {
            assert!(matches!(
                FilterSet::parse(expression),
                Err(QuantError::InvalidFilter(_))
            ));
        }
        // matching pairs still parse
        let filters = FilterSet::parse("organism == 'human'").unwrap();
        assert_eq!(
            filters.predicates()[0],
            Predicate::new("organism", FilterOp::Eq, FilterValue::Str("human".into()))
        );
    }

    #[test]
    fn test_filter_drops_rows_where_field_exists() {
        let filtered = apply_filter(&container(), &FilterSet::parse("score >= 0.5").unwrap());
        let psms = filtered.assay("psms").unwrap();
        // psm2 fails, psm3's missing score fails
        assert_eq!(psms.row_ids(), ["psm1".to_string()]);
        // the collapsed score column at the peptide level is all-missing
        // (non-uniform in PEPTIDE, absent in ELVISK), so every peptide
        // fails the predicate too
        assert_eq!(filtered.assay("peptides").unwrap().n_rows(), 0);
        // link maps restricted to the survivors
        let link = filtered.links().parent_edge("peptides").unwrap();
        assert!(link.is_empty());
    }

    #[test]
    fn test_assay_without_the_field_is_untouched() {
        // a QC assay ingested separately, with no score column
        let qc = Assay::new(
            vec!["s1".into()],
            vec![vec![Some(42.0)]],
            MetaTable::new(vec!["tic".into()]),
        )
        .unwrap();
        let container = container().add_assay("qc", qc).unwrap();

        let filtered = apply_filter(&container, &FilterSet::parse("score >= 0.5").unwrap());
        assert_eq!(filtered.assay("qc").unwrap().n_rows(), 1);
        assert_eq!(filtered.assay("psms").unwrap().n_rows(), 1);
    }

    #[test]
    fn test_filter_matches_in_every_assay_with_the_field() {
        // sequence exists in both levels
        let filtered = apply_filter(
            &container(),
            &FilterSet::parse("sequence == ELVISK").unwrap(),
        );
        assert_eq!(filtered.assay("psms").unwrap().n_rows(), 1);
        assert_eq!(filtered.assay("peptides").unwrap().n_rows(), 1);
    }

    #[test]
    fn test_emptied_assay_is_not_an_error() {
        // charge collapses to missing for PEPTIDE and 2 for ELVISK, so no
        // peptide passes while one psm does
        let filtered = apply_filter(&container(), &FilterSet::parse("charge == 3").unwrap());
        assert_eq!(filtered.assay("psms").unwrap().n_rows(), 1);
        assert_eq!(filtered.assay("peptides").unwrap().n_rows(), 0);
        let link = filtered.links().parent_edge("peptides").unwrap();
        assert!(link.is_empty());
        // the edge itself is still present
        assert_eq!(filtered.links().edges().len(), 1);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filters = FilterSet::parse("charge == 2").unwrap();
        let once = apply_filter(&container(), &filters);
        let twice = apply_filter(&once, &filters);
        assert_eq!(once, twice);
    }
}
