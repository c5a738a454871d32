//! # mzQuant Pipeline Tool
//!
//! A command-line tool for summarizing flat quantitation tables into
//! linked feature hierarchies.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a mock PSM table
//! mzquant demo psms.tsv
//!
//! # Inspect an ingested table
//! mzquant info psms.tsv --quant-cols sample_1,sample_2 --id-col psm_id
//!
//! # Filter, aggregate PSMs to peptides to proteins, export long form
//! mzquant summarize psms.tsv --quant-cols sample_1,sample_2 --id-col psm_id \
//!     --filter "score >= 0.5" --group-by sequence --group-by protein \
//!     --output long.tsv
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
use cli::ReducerArg;

/// mzQuant - Linked Quantitative Feature Tables
#[derive(Parser)]
#[command(name = "mzquant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mock PSM quantitation table for testing
    Demo {
        /// Output TSV path
        #[arg(value_name = "OUTPUT", default_value = "demo_psms.tsv")]
        output: PathBuf,

        /// Number of PSM rows to generate
        #[arg(short = 'n', long, default_value = "60")]
        psms: usize,

        /// Number of sample (intensity) columns
        #[arg(short = 's', long, default_value = "3")]
        samples: usize,
    },

    /// Display information about a flat quantitation table
    Info {
        /// Input TSV path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Quantitation column names, comma separated
        #[arg(short = 'q', long, value_delimiter = ',', required = true)]
        quant_cols: Vec<String>,

        /// Column holding feature ids (synthesized when omitted)
        #[arg(long)]
        id_col: Option<String>,
    },

    /// Ingest, filter, aggregate, and export a quantitation hierarchy
    Summarize {
        /// Input TSV path
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Quantitation column names, comma separated
        #[arg(short = 'q', long, value_delimiter = ',', required = true)]
        quant_cols: Vec<String>,

        /// Column holding feature ids (synthesized when omitted)
        #[arg(long)]
        id_col: Option<String>,

        /// Filter expression, e.g. 'score >= 0.5 & charge in (2, 3)'
        #[arg(short = 'f', long)]
        filter: Option<String>,

        /// Row-metadata column to aggregate on; repeat to chain levels
        #[arg(short = 'g', long = "group-by")]
        group_by: Vec<String>,

        /// Reduction applied per group and sample
        #[arg(short = 'r', long, value_enum, default_value_t = ReducerArg::Mean)]
        reducer: ReducerArg,

        /// Write the final hierarchy as a long-form TSV
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Print a JSON summary of assays and links
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Demo {
            output,
            psms,
            samples,
        } => cli::demo::run(output, psms, samples),
        Commands::Info {
            input,
            quant_cols,
            id_col,
        } => cli::info::run(input, quant_cols, id_col),
        Commands::Summarize {
            input,
            quant_cols,
            id_col,
            filter,
            group_by,
            reducer,
            output,
            json,
        } => cli::summarize::run(
            input, quant_cols, id_col, filter, group_by, reducer, output, json,
        ),
    }
}
