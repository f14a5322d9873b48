//! Command-line interface definitions and argument parsing

use crate::config::{PipelineConfig, DEFAULT_INPUT, DEFAULT_MIN_ROWS, DEFAULT_OUTPUT_DIR};
use crate::model::UnknownLabelPolicy;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Policy for region/category labels outside the known set
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliUnknownLabels {
    /// Fail the run on the first unknown label
    Reject,
    /// Bucket unknown labels as "Other"
    Other,
}

impl From<CliUnknownLabels> for UnknownLabelPolicy {
    fn from(cli: CliUnknownLabels) -> Self {
        match cli {
            CliUnknownLabels::Reject => UnknownLabelPolicy::Reject,
            CliUnknownLabels::Other => UnknownLabelPolicy::Other,
        }
    }
}

/// Sales analytics: revenue trend, regional margins, category mix and
/// customer segmentation rendered as HTML chart reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Directory receiving the report documents
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Create the output directory if it does not exist
    #[arg(long)]
    pub create_output_dir: bool,

    /// Nearest-rank percentile separating power users (0.8 = top 20% by count)
    #[arg(short, long, default_value = "0.8")]
    pub percentile: Decimal,

    /// Minimum number of rows that must survive cleaning
    #[arg(long, default_value_t = DEFAULT_MIN_ROWS)]
    pub min_rows: usize,

    /// What to do with unrecognised region or category labels
    #[arg(long, value_enum, default_value = "other")]
    pub unknown_labels: CliUnknownLabels,

    /// First day of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    pub window_start: Option<NaiveDate>,

    /// Last day of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    pub window_end: Option<NaiveDate>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors, skip the summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            input: self.input.clone(),
            output_dir: self.output_dir.clone(),
            create_output_dir: self.create_output_dir,
            power_user_percentile: self.percentile,
            min_rows: self.min_rows,
            unknown_labels: self.unknown_labels.into(),
            window_start: self.window_start,
            window_end: self.window_end,
        }
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
