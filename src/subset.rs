//! # Feature-subset engine
//!
//! Subsets a container to everything connected to a set of target
//! features: the targets themselves wherever they occur as row ids, their
//! ancestors up every aggregation edge, and their descendants down every
//! edge. Assays unconnected to any target legitimately come back empty;
//! targets matching nothing anywhere are rejected.

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::assay::Assay;
use crate::container::QuantContainer;
use crate::error::QuantError;

/// Subset every assay to the closure of `feature_ids` in the link graph.
///
/// Multiple features are unioned: the result holds each feature's
/// connected closure, with shared rows appearing once. Fails with
/// `NotFound` when no feature id matches a row in any assay.
pub fn subset_by_feature(
    container: &QuantContainer,
    feature_ids: &[&str],
) -> Result<QuantContainer, QuantError> {
    let mut seeds: HashMap<String, HashSet<String>> = HashMap::new();
    for (name, assay) in container.assays() {
        for id in feature_ids {
            if assay.has_row(id) {
                seeds
                    .entry(name.to_string())
                    .or_default()
                    .insert((*id).to_string());
            }
        }
    }
    if seeds.values().all(HashSet::is_empty) {
        return Err(QuantError::not_found(format!(
            "none of the {} feature ids match any assay row",
            feature_ids.len()
        )));
    }
    debug!(
        "feature subset: {} ids matched directly in {} assays",
        feature_ids.len(),
        seeds.len()
    );

    let closure = container.links().closure(&seeds);
    let empty = HashSet::new();
    let assays: Vec<(String, Assay)> = container
        .assays()
        .map(|(name, assay)| {
            let keep: HashSet<&str> = closure
                .get(name)
                .unwrap_or(&empty)
                .iter()
                .map(String::as_str)
                .collect();
            (name.to_string(), assay.retain_rows(&keep))
        })
        .collect();
    let links = container.links().restricted(&closure);
    Ok(container.derived(assays, links))
}
