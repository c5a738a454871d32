use anyhow::{Context, Result};
use std::path::PathBuf;

use mzquant::prelude::*;

/// Display per-assay information about an ingested quantitation table.
pub fn run(input: PathBuf, quant_cols: Vec<String>, id_col: Option<String>) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("File does not exist: {}", input.display());
    }

    let quant_refs: Vec<&str> = quant_cols.iter().map(String::as_str).collect();
    let mut config = IngestConfig::new("psms", &quant_refs);
    if let Some(id_col) = &id_col {
        config = config.with_id_column(id_col);
    }
    let container = read_container_from_path(&input, &config)
        .with_context(|| format!("Failed to ingest {}", input.display()))?;

    println!("mzQuant Table Information");
    println!("=========================");
    println!("File: {}", input.display());
    println!();

    for (name, assay) in container.assays() {
        println!("Assay '{}':", name);
        println!("  Features: {}", assay.n_rows());
        println!("  Samples:  {}", assay.n_samples());
        println!("  Row metadata columns:");
        for (column_name, column) in assay.row_data().columns() {
            println!("    {:20} {:?}", column_name, column.data_type());
        }
    }
    Ok(())
}
