//! Salesforge: sales analytics over a transaction CSV
//!
//! Loads a sales dataset, cleans it with category-scoped median imputation,
//! computes the monthly revenue trend, regional margins, category mix and a
//! revenue-ranked customer segmentation, and renders each as a self-contained
//! HTML chart report.

pub mod clean;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod viz;

// Re-export public items for easier access
pub use clean::{clean, CleaningOptions, CleaningReport};
pub use cli::Args;
pub use config::PipelineConfig;
pub use data::{load_transactions, RawTable};
pub use error::AnalyticsError;
pub use metrics::Reports;
pub use model::{Category, Region, Transaction, UnknownLabelPolicy};
pub use pipeline::{analyze, run, PipelineOutcome};
pub use viz::{render_reports, ARTIFACT_FILES};

/// Result type used by the chart drawing code
pub type Result<T> = anyhow::Result<T>;
