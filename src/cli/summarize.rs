use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use mzquant::prelude::*;

use super::ReducerArg;

/// One run of the ingest -> filter -> aggregate -> export pipeline.
#[allow(clippy::too_many_arguments)]
pub fn run(
    input: PathBuf,
    quant_cols: Vec<String>,
    id_col: Option<String>,
    filter_expr: Option<String>,
    group_by: Vec<String>,
    reducer: ReducerArg,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let quant_refs: Vec<&str> = quant_cols.iter().map(String::as_str).collect();
    let mut config = IngestConfig::new("psms", &quant_refs);
    if let Some(id_col) = &id_col {
        config = config.with_id_column(id_col);
    }

    let mut container = read_container_from_path(&input, &config)
        .with_context(|| format!("Failed to ingest {}", input.display()))?;
    info!(
        "ingested '{}': {} features",
        input.display(),
        container.assay("psms")?.n_rows()
    );

    if let Some(expression) = &filter_expr {
        let filters = FilterSet::parse(expression).context("Failed to parse filter expression")?;
        container = apply_filter(&container, &filters);
        info!(
            "filter '{}' kept {} features in 'psms'",
            expression,
            container.assay("psms")?.n_rows()
        );
    }

    // Chain one aggregation per grouping column; each new assay is named
    // after the column it was grouped on.
    let mut source = "psms".to_string();
    for column in &group_by {
        container = aggregate(&container, &source, column, column, reducer.into())
            .with_context(|| format!("Failed to aggregate '{}' by '{}'", source, column))?;
        info!(
            "aggregated '{}' by '{}': {} groups",
            source,
            column,
            container.assay(column)?.n_rows()
        );
        source = column.clone();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary(&container))?);
    }

    if let Some(path) = &output {
        let long = container.long_form(None, &[])?;
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_table(&long, BufWriter::new(file), b'\t')
            .context("Failed to write long-form table")?;
        println!("Wrote long-form table ({} rows) to {}", long.n_rows(), path.display());
    } else if !json {
        for (name, assay) in container.assays() {
            println!(
                "{}: {} features x {} samples",
                name,
                assay.n_rows(),
                assay.n_samples()
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ContainerSummary {
    assays: Vec<AssaySummary>,
    links: Vec<LinkSummary>,
}

#[derive(Serialize)]
struct AssaySummary {
    name: String,
    features: usize,
    samples: usize,
}

#[derive(Serialize)]
struct LinkSummary {
    parent: String,
    child: String,
    mapped_rows: usize,
}

fn summary(container: &QuantContainer) -> ContainerSummary {
    ContainerSummary {
        assays: container
            .assays()
            .map(|(name, assay)| AssaySummary {
                name: name.to_string(),
                features: assay.n_rows(),
                samples: assay.n_samples(),
            })
            .collect(),
        links: container
            .links()
            .edges()
            .iter()
            .map(|edge| LinkSummary {
                parent: edge.parent().to_string(),
                child: edge.child().to_string(),
                mapped_rows: edge.n_mapped_rows(),
            })
            .collect(),
    }
}
