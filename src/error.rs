//! Crate-level error taxonomy.
//!
//! Every fallible container operation surfaces one of these kinds
//! synchronously and leaves the input container untouched: operations build
//! a new value and only hand it back on full success, so a caller never
//! observes partially-updated state.

/// Errors raised by container, aggregation, filter, and subset operations.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    /// Unknown assay name, unmatched feature id, or unknown sample id.
    #[error("not found: {0}")]
    NotFound(String),

    /// An assay with this name already exists in the container.
    #[error("assay name already in use: {0}")]
    NameCollision(String),

    /// Column/sample identity mismatch between an assay and the container.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// A grouping or filter field is absent where it is required.
    #[error("missing column: {0}")]
    MissingColumn(String),

    /// Row counts disagree between a table and the assay it describes.
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    /// A declarative filter expression could not be parsed.
    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),
}

impl QuantError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub(crate) fn dimension(message: impl Into<String>) -> Self {
        Self::Dimension(message.into())
    }
}
