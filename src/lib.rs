//! # mzQuant - Linked Quantitative Feature Tables
//!
//! `mzquant` manages the table hierarchy produced by quantitative mass
//! spectrometry: spectral matches are summarized into peptides, peptides
//! into proteins, and every level stays linked to the rows it came from.
//! The crate keeps all levels together in one [`QuantContainer`] and uses
//! the recorded row-to-row provenance to subset or filter every level
//! consistently.
//!
//! ## Key Pieces
//!
//! - **[`Assay`]**: one rectangular table of intensities (rows = features,
//!   columns = samples) with typed row metadata.
//!
//! - **[`QuantContainer`]**: the ordered set of named assays, the shared
//!   sample-metadata table, and the link graph. Containers are values:
//!   every operation returns a new container and never mutates the input.
//!
//! - **[`aggregate`]**: group an assay's rows by a metadata column and
//!   combine intensities per sample, recording which rows fed which group.
//!
//! - **[`apply_filter`] / [`subset_by_feature`]**: drop rows by attribute
//!   predicate, or extract everything connected to a set of features, with
//!   the selection propagated through the linked levels.
//!
//! ## Quick Start
//!
//! ```rust
//! use mzquant::prelude::*;
//!
//! // Ingest a flat PSM table: two quantitation columns, the rest is
//! // row metadata.
//! let tsv = "\
//! psm\tsequence\tscore\tintA\tintB
//! psm1\tPEPTIDE\t0.9\t1.0\t2.0
//! psm2\tPEPTIDE\t0.8\t3.0\t4.0
//! psm3\tELVISK\t0.4\t5.0\t6.0
//! ";
//! let config = IngestConfig::new("psms", &["intA", "intB"]).with_id_column("psm");
//! let container = read_container(std::io::Cursor::new(tsv), &config)?;
//!
//! // Summarize spectral matches into peptides.
//! let container = aggregate(&container, "psms", "sequence", "peptides", Reducer::Mean)?;
//! assert_eq!(container.assay("peptides")?.value("PEPTIDE", "intA"), Some(2.0));
//!
//! // Filter on an attribute; assays without the field are untouched.
//! let filtered = apply_filter(&container, &FilterSet::parse("score >= 0.5")?);
//! assert_eq!(filtered.assay("psms")?.n_rows(), 2);
//!
//! // Extract one peptide's whole evidence chain.
//! let subset = subset_by_feature(&container, &["ELVISK"])?;
//! assert_eq!(subset.assay("psms")?.row_ids(), ["psm3".to_string()]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Value Semantics
//!
//! Aggregation, filtering, and subsetting are pure transformations: each
//! returns a new container built from the old one. An operation either
//! fully succeeds or fails with a [`QuantError`], in which case the caller
//! still holds the unmodified input. Independent pipelines branched from
//! one container never interfere.

#![warn(missing_docs)]

pub mod aggregate;
pub mod assay;
pub mod container;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod link;
pub mod subset;
pub mod table;

pub use aggregate::{aggregate, aggregate_with, Reducer};
pub use assay::Assay;
pub use container::QuantContainer;
pub use error::QuantError;
pub use filter::{apply_filter, FilterSet};
pub use subset::subset_by_feature;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::aggregate::{aggregate, aggregate_with, Reducer, COLLAPSED_MARKER};
    pub use crate::assay::Assay;
    pub use crate::container::QuantContainer;
    pub use crate::error::QuantError;
    pub use crate::filter::{apply_filter, FilterOp, FilterSet, FilterValue, Predicate};
    pub use crate::ingest::{
        read_container, read_container_from_path, write_table, IngestConfig, IngestError,
    };
    pub use crate::link::{AssayLink, LinkGraph};
    pub use crate::subset::subset_by_feature;
    pub use crate::table::{Cell, Column, DataType, MetaTable};
}
