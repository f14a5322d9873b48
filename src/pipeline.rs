//! Load, clean, compute and render in one pass

use crate::clean::{clean, CleaningReport};
use crate::config::PipelineConfig;
use crate::data::load_transactions;
use crate::error::AnalyticsError;
use crate::metrics::{checked_sum, Reports};
use crate::viz::render_reports;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Everything a successful run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub cleaning: CleaningReport,
    pub reports: Reports,
    pub artifacts: Vec<PathBuf>,
}

/// Compute the four reports without touching the output directory
pub fn analyze(config: &PipelineConfig) -> Result<(CleaningReport, Reports), AnalyticsError> {
    config.validate()?;

    let start = Instant::now();
    let raw = load_transactions(&config.input)?;
    let cleaned = clean(&raw, &config.cleaning_options())?;
    info!("Data prepared in {:.2}s", start.elapsed().as_secs_f64());

    if cleaned.transactions.is_empty() {
        return Err(AnalyticsError::Computation(
            "no transactions to aggregate".to_string(),
        ));
    }

    let start = Instant::now();
    let reports = Reports::compute(&cleaned.transactions, config.power_user_percentile)?;
    info!(
        "Computed metrics for {} months, {} regions, {} categories, {} customers in {:.2}s",
        reports.trend.points.len(),
        reports.regional.ranking.len(),
        reports.category.categories.len(),
        reports.segmentation.total_customers(),
        start.elapsed().as_secs_f64()
    );

    let category_total = checked_sum(reports.category.categories.iter().map(|c| c.revenue))?;
    if category_total != reports.category.total_revenue {
        return Err(AnalyticsError::Computation(format!(
            "category revenues sum to {} but total revenue is {}",
            category_total, reports.category.total_revenue
        )));
    }

    Ok((cleaned.report, reports))
}

/// Run the whole pipeline; either all four artifacts are written or none are
pub fn run(config: &PipelineConfig) -> Result<PipelineOutcome, AnalyticsError> {
    let (cleaning, reports) = analyze(config)?;
    let artifacts = render_reports(&reports, &config.output_dir, config.create_output_dir)?;

    Ok(PipelineOutcome {
        cleaning,
        reports,
        artifacts,
    })
}
