//! # Flat-table ingestion
//!
//! Search-engine output usually arrives as one flat delimited table: a set
//! of quantitation columns (one per sample) and everything else as
//! per-feature annotation. This module turns such a table into a
//! single-assay [`QuantContainer`], inferring a dtype for every metadata
//! column and validating the designated columns against the header.
//!
//! The container core never parses files itself; this boundary hands it a
//! ready-made assay.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::debug;

use crate::assay::Assay;
use crate::container::QuantContainer;
use crate::error::QuantError;
use crate::table::{Cell, Column, MetaTable};

/// Errors returned when a flat table cannot be ingested.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error reading the table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV/TSV parsing error.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// A designated quantitation or id column is absent from the header.
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// A quantitation cell could not be read as a number.
    #[error("ingest contract violation: {0}")]
    ContractViolation(String),

    /// Invariant violation surfaced while assembling the assay.
    #[error(transparent)]
    Quant(#[from] QuantError),
}

impl IngestError {
    fn violation(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }
}

/// How to read one flat quantitation table.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Name for the resulting assay.
    pub assay_name: String,
    /// Header names of the quantitation (sample) columns, in sample order.
    pub quant_columns: Vec<String>,
    /// Header name of the column holding feature ids; when `None`, ids
    /// `F1`, `F2`, ... are synthesized in row order.
    pub id_column: Option<String>,
    /// Field delimiter, tab by default.
    pub delimiter: u8,
}

impl IngestConfig {
    pub fn new(assay_name: &str, quant_columns: &[&str]) -> Self {
        Self {
            assay_name: assay_name.to_string(),
            quant_columns: quant_columns.iter().map(|c| c.to_string()).collect(),
            id_column: None,
            delimiter: b'\t',
        }
    }

    pub fn with_id_column(mut self, id_column: &str) -> Self {
        self.id_column = Some(id_column.to_string());
        self
    }
}

/// Cells that read as missing in a delimited table.
fn is_missing_text(text: &str) -> bool {
    text.is_empty() || text == "NA" || text == "NaN"
}

/// Read a flat table into a single assay.
pub fn read_assay<R: BufRead>(reader: R, config: &IngestConfig) -> Result<Assay, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .flexible(false)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let quant_positions: Vec<usize> = config
        .quant_columns
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| IngestError::MissingColumn(name.clone()))
        })
        .collect::<Result<_, _>>()?;
    let id_position = match &config.id_column {
        Some(name) => Some(
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| IngestError::MissingColumn(name.clone()))?,
        ),
        None => None,
    };

    let mut row_ids: Vec<String> = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = Vec::new();
    let mut raw_metadata: Vec<Vec<Option<String>>> = Vec::new();
    let metadata_positions: Vec<usize> = (0..headers.len())
        .filter(|i| !quant_positions.contains(i) && Some(*i) != id_position)
        .collect();

    for (row_index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let id = match id_position {
            Some(i) => record
                .get(i)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    IngestError::violation(format!("row {} has an empty feature id", row_index + 1))
                })?,
            None => format!("F{}", row_index + 1),
        };
        row_ids.push(id);

        let mut row_values = Vec::with_capacity(quant_positions.len());
        for (&position, name) in quant_positions.iter().zip(&config.quant_columns) {
            let text = record.get(position).unwrap_or("").trim();
            if is_missing_text(text) {
                row_values.push(None);
            } else {
                let parsed = text.parse::<f64>().map_err(|_| {
                    IngestError::violation(format!(
                        "row {}, column '{}': '{}' is not numeric",
                        row_index + 1,
                        name,
                        text
                    ))
                })?;
                row_values.push(Some(parsed));
            }
        }
        values.push(row_values);

        raw_metadata.push(
            metadata_positions
                .iter()
                .map(|&position| {
                    let text = record.get(position).unwrap_or("").trim();
                    if is_missing_text(text) {
                        None
                    } else {
                        Some(text.to_string())
                    }
                })
                .collect(),
        );
    }

    let columns: Vec<(String, Column)> = metadata_positions
        .iter()
        .enumerate()
        .map(|(slot, &position)| {
            let cells: Vec<Option<String>> =
                raw_metadata.iter().map(|row| row[slot].clone()).collect();
            (headers[position].clone(), infer_column(cells))
        })
        .collect();
    debug!(
        "ingested {} rows, {} samples, {} metadata columns",
        row_ids.len(),
        config.quant_columns.len(),
        columns.len()
    );

    let row_data = MetaTable::with_columns(row_ids, columns)?;
    Ok(Assay::new(config.quant_columns.clone(), values, row_data)?)
}

/// Read a flat table into a container holding its single assay.
pub fn read_container<R: BufRead>(
    reader: R,
    config: &IngestConfig,
) -> Result<QuantContainer, IngestError> {
    let assay = read_assay(reader, config)?;
    Ok(QuantContainer::new().add_assay(&config.assay_name, assay)?)
}

/// Read a flat table from a file path.
pub fn read_container_from_path<P: AsRef<Path>>(
    path: P,
    config: &IngestConfig,
) -> Result<QuantContainer, IngestError> {
    let file = File::open(path)?;
    read_container(BufReader::new(file), config)
}

/// Infer the narrowest dtype covering every non-missing cell:
/// Int, then Float, then Bool, falling back to Str.
fn infer_column(cells: Vec<Option<String>>) -> Column {
    let observed: Vec<&str> = cells.iter().flatten().map(String::as_str).collect();
    if !observed.is_empty() && observed.iter().all(|s| s.parse::<i64>().is_ok()) {
        return Column::Int(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                .collect(),
        );
    }
    if !observed.is_empty() && observed.iter().all(|s| s.parse::<f64>().is_ok()) {
        return Column::Float(
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.parse().ok()))
                .collect(),
        );
    }
    if !observed.is_empty() && observed.iter().all(|s| *s == "true" || *s == "false") {
        return Column::Bool(
            cells
                .iter()
                .map(|c| c.as_deref().map(|s| s == "true"))
                .collect(),
        );
    }
    Column::Str(cells)
}

/// Write a metadata table (long-form output included) as delimited text,
/// one record per row with a leading feature-id field.
pub fn write_table<W: Write>(
    table: &MetaTable,
    writer: W,
    delimiter: u8,
) -> Result<(), IngestError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let mut header = vec!["id".to_string()];
    header.extend(table.column_names().map(str::to_string));
    csv_writer.write_record(&header)?;

    for (row, id) in table.row_ids().iter().enumerate() {
        let mut record = vec![id.clone()];
        for (_, column) in table.columns() {
            record.push(match column.cell(row) {
                Cell::Missing => "NA".to_string(),
                cell => cell.render(),
            });
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DataType;
    use std::io::Cursor;

    const PSM_TSV: &str = "\
psm_id\tsequence\tscore\tcharge\tdecoy\ts1\ts2
psm1\tPEPTIDE\t0.9\t2\tfalse\t1.5\t2.5
psm2\tPEPTIDE\t0.4\t3\tfalse\t3.5\tNA
psm3\tELVISK\tNA\t2\ttrue\t5.5\t6.5
";

    fn config() -> IngestConfig {
        IngestConfig::new("psms", &["s1", "s2"]).with_id_column("psm_id")
    }

    #[test]
    fn test_read_assay_infers_dtypes() {
        let assay = read_assay(Cursor::new(PSM_TSV), &config()).unwrap();
        assert_eq!(assay.n_rows(), 3);
        assert_eq!(assay.sample_ids(), ["s1".to_string(), "s2".to_string()]);
        assert_eq!(assay.value("psm2", "s2"), None);

        let row_data = assay.row_data();
        assert_eq!(row_data.column("sequence").unwrap().data_type(), DataType::Str);
        assert_eq!(row_data.column("score").unwrap().data_type(), DataType::Float);
        assert_eq!(row_data.column("charge").unwrap().data_type(), DataType::Int);
        assert_eq!(row_data.column("decoy").unwrap().data_type(), DataType::Bool);
        assert!(row_data.column("score").unwrap().cell(2).is_missing());
        // the id column is consumed, not duplicated as metadata
        assert!(!row_data.has_column("psm_id"));
    }

    #[test]
    fn test_synthesized_ids() {
        let config = IngestConfig::new("psms", &["s1", "s2"]);
        let container = read_container(Cursor::new(PSM_TSV), &config).unwrap();
        let assay = container.assay("psms").unwrap();
        assert_eq!(assay.row_ids()[0], "F1");
        // psm_id stays around as an ordinary metadata column
        assert!(assay.row_data().has_column("psm_id"));
    }

    #[test]
    fn test_missing_columns_and_bad_numbers() {
        let config = IngestConfig::new("psms", &["s1", "s9"]);
        assert!(matches!(
            read_assay(Cursor::new(PSM_TSV), &config),
            Err(IngestError::MissingColumn(_))
        ));

        let bad = "id\ts1\na\tnot_a_number\n";
        let config = IngestConfig::new("psms", &["s1"]).with_id_column("id");
        assert!(matches!(
            read_assay(Cursor::new(bad), &config),
            Err(IngestError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_write_table_renders_missing_as_na() {
        let assay = read_assay(Cursor::new(PSM_TSV), &config()).unwrap();
        let mut out = Vec::new();
        write_table(assay.row_data(), &mut out, b'\t').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("id\tsequence\tscore\tcharge\tdecoy"));
        assert!(text.contains("psm3\tELVISK\tNA\t2\ttrue"));
    }
}
