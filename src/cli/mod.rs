//! Subcommand implementations for the `mzquant` binary.

pub mod demo;
pub mod info;
pub mod summarize;

use clap::ValueEnum;
use mzquant::Reducer;

/// Reduction used when combining a group's values, per sample.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ReducerArg {
    /// Arithmetic mean of the non-missing values
    #[default]
    Mean,
    /// Sum of the non-missing values
    Sum,
    /// Median of the non-missing values
    Median,
    /// Count of non-missing values
    Count,
}

impl From<ReducerArg> for Reducer {
    fn from(arg: ReducerArg) -> Self {
        match arg {
            ReducerArg::Mean => Reducer::Mean,
            ReducerArg::Sum => Reducer::Sum,
            ReducerArg::Median => Reducer::Median,
            ReducerArg::Count => Reducer::Count,
        }
    }
}
