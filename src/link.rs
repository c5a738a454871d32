//! # Assay links and the link graph
//!
//! Aggregation collapses many source rows into one group row; an
//! [`AssayLink`] records exactly which parent rows fed each child row, and
//! the [`LinkGraph`] collects one link per aggregation edge. Because every
//! assay is aggregated from at most one source, the graph is a forest:
//! closure queries walk upward through each link's child-to-parent map and
//! downward through the stored inverse.
//!
//! Links are never mutated after creation. When rows disappear (filtering,
//! feature subsetting) the graph hands out a restricted copy instead.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::QuantError;

/// The provenance edge between one child (aggregated) assay and its parent
/// (source) assay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayLink {
    parent: String,
    child: String,
    child_to_parents: BTreeMap<String, BTreeSet<String>>,
    /// Inverse of `child_to_parents`, kept for downward traversal.
    parent_to_children: BTreeMap<String, BTreeSet<String>>,
}

impl AssayLink {
    /// Record an edge from `child_to_parents`, deriving the inverse map.
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        child_to_parents: BTreeMap<String, BTreeSet<String>>,
    ) -> Self {
        let mut parent_to_children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (child_row, parent_rows) in &child_to_parents {
            for parent_row in parent_rows {
                parent_to_children
                    .entry(parent_row.clone())
                    .or_default()
                    .insert(child_row.clone());
            }
        }
        Self {
            parent: parent.into(),
            child: child.into(),
            child_to_parents,
            parent_to_children,
        }
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    /// Parent rows that fed this child row.
    pub fn parents_of(&self, child_row: &str) -> Option<&BTreeSet<String>> {
        self.child_to_parents.get(child_row)
    }

    /// Child rows this parent row contributed to.
    pub fn children_of(&self, parent_row: &str) -> Option<&BTreeSet<String>> {
        self.parent_to_children.get(parent_row)
    }

    pub fn n_mapped_rows(&self) -> usize {
        self.child_to_parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.child_to_parents.is_empty()
    }

    /// A copy keeping only the (parent row, child row) pairs whose both
    /// endpoints survive. Entries left without any pair are dropped; the
    /// edge itself remains even when its map empties out.
    fn restricted(
        &self,
        parent_rows: &HashSet<&str>,
        child_rows: &HashSet<&str>,
    ) -> AssayLink {
        let mut kept: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (child_row, parents) in &self.child_to_parents {
            if !child_rows.contains(child_row.as_str()) {
                continue;
            }
            let surviving: BTreeSet<String> = parents
                .iter()
                .filter(|p| parent_rows.contains(p.as_str()))
                .cloned()
                .collect();
            if !surviving.is_empty() {
                kept.insert(child_row.clone(), surviving);
            }
        }
        AssayLink::new(self.parent.clone(), self.child.clone(), kept)
    }
}

fn seed_queue(seeds: &HashMap<String, HashSet<String>>) -> VecDeque<(String, String)> {
    seeds
        .iter()
        .flat_map(|(assay, rows)| rows.iter().map(move |row| (assay.clone(), row.clone())))
        .collect()
}

/// The forest of [`AssayLink`]s across one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkGraph {
    edges: Vec<AssayLink>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an edge. Each assay may have at most one direct parent.
    pub fn add_edge(&mut self, link: AssayLink) -> Result<(), QuantError> {
        if self.parent_edge(link.child()).is_some() {
            return Err(QuantError::schema(format!(
                "assay '{}' already has a parent link",
                link.child()
            )));
        }
        self.edges.push(link);
        Ok(())
    }

    pub fn edges(&self) -> &[AssayLink] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The edge whose child is `assay`, if that assay was aggregated.
    pub fn parent_edge(&self, assay: &str) -> Option<&AssayLink> {
        self.edges.iter().find(|e| e.child() == assay)
    }

    /// All edges whose parent is `assay`.
    pub fn child_edges<'a>(&'a self, assay: &'a str) -> impl Iterator<Item = &'a AssayLink> {
        self.edges.iter().filter(move |e| e.parent() == assay)
    }

    /// Expand a seed selection to its closure: every ancestor row (walking
    /// each link's child-to-parent map transitively) and every descendant
    /// row (walking the inverse maps transitively). The walks are monotone:
    /// an ancestor's unrelated descendants are not pulled in, so the closure
    /// of a protein is its own evidence chain, not the whole connected
    /// component around a shared spectral match.
    pub fn closure(
        &self,
        seeds: &HashMap<String, HashSet<String>>,
    ) -> HashMap<String, HashSet<String>> {
        let mut reached: HashMap<String, HashSet<String>> = HashMap::new();
        for (assay, rows) in seeds {
            reached.entry(assay.clone()).or_default().extend(rows.iter().cloned());
        }

        // Each walk keeps its own visited set. A row already reached as one
        // seed's ancestor must still be expanded downward when another seed
        // lies beneath it, or that seed's descendants would be lost from
        // the union.
        let mut steps = 0usize;

        // Upward: toward the raw (parent) assays.
        let mut queue: VecDeque<(String, String)> = seed_queue(seeds);
        let mut visited: HashSet<(String, String)> = queue.iter().cloned().collect();
        while let Some((assay, row)) = queue.pop_front() {
            steps += 1;
            if let Some(edge) = self.parent_edge(&assay) {
                if let Some(parents) = edge.parents_of(&row) {
                    for parent_row in parents {
                        let next = (edge.parent().to_string(), parent_row.clone());
                        if visited.insert(next.clone()) {
                            reached
                                .entry(next.0.clone())
                                .or_default()
                                .insert(next.1.clone());
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        // Downward: toward the aggregated (child) assays.
        let mut queue: VecDeque<(String, String)> = seed_queue(seeds);
        let mut visited: HashSet<(String, String)> = queue.iter().cloned().collect();
        while let Some((assay, row)) = queue.pop_front() {
            steps += 1;
            for edge in self.child_edges(&assay) {
                if let Some(children) = edge.children_of(&row) {
                    for child_row in children {
                        let next = (edge.child().to_string(), child_row.clone());
                        if visited.insert(next.clone()) {
                            reached
                                .entry(next.0.clone())
                                .or_default()
                                .insert(next.1.clone());
                            queue.push_back(next);
                        }
                    }
                }
            }
        }

        debug!("link closure visited {steps} rows across {} assays", reached.len());
        reached
    }

    /// A restricted copy of the whole graph given the surviving row ids per
    /// assay. Assays absent from `surviving` are treated as fully removed;
    /// callers pass an entry for every assay they keep.
    pub fn restricted(&self, surviving: &HashMap<String, HashSet<String>>) -> LinkGraph {
        let empty = HashSet::new();
        let edges = self
            .edges
            .iter()
            .map(|edge| {
                let parent_rows: HashSet<&str> = surviving
                    .get(edge.parent())
                    .unwrap_or(&empty)
                    .iter()
                    .map(String::as_str)
                    .collect();
                let child_rows: HashSet<&str> = surviving
                    .get(edge.child())
                    .unwrap_or(&empty)
                    .iter()
                    .map(String::as_str)
                    .collect();
                edge.restricted(&parent_rows, &child_rows)
            })
            .collect();
        LinkGraph { edges }
    }
}
