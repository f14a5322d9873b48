//! Run configuration passed explicitly into the pipeline

use crate::clean::CleaningOptions;
use crate::error::AnalyticsError;
use crate::model::UnknownLabelPolicy;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;

pub const DEFAULT_INPUT: &str = "data/Global_Superstore2.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "docs/reports";
pub const DEFAULT_MIN_ROWS: usize = 10;

/// Everything a pipeline run needs to know
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Transaction CSV to analyse
    pub input: PathBuf,
    /// Directory receiving the four report documents
    pub output_dir: PathBuf,
    /// Create `output_dir` when it does not exist instead of failing
    pub create_output_dir: bool,
    /// Nearest-rank percentile separating power users from the rest (0.8 keeps
    /// the top 20% of customers by count)
    pub power_user_percentile: Decimal,
    /// Fewer surviving rows than this is a data quality error
    pub min_rows: usize,
    pub unknown_labels: UnknownLabelPolicy,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            create_output_dir: false,
            power_user_percentile: Decimal::new(8, 1),
            min_rows: DEFAULT_MIN_ROWS,
            unknown_labels: UnknownLabelPolicy::Other,
            window_start: None,
            window_end: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.power_user_percentile <= Decimal::ZERO || self.power_user_percentile >= Decimal::ONE
        {
            return Err(AnalyticsError::Config(format!(
                "percentile must lie strictly between 0 and 1, got {}",
                self.power_user_percentile
            )));
        }
        if self.min_rows == 0 {
            return Err(AnalyticsError::Config(
                "minimum row count must be at least 1".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.window_start, self.window_end) {
            if start > end {
                return Err(AnalyticsError::Config(format!(
                    "analysis window starts ({}) after it ends ({})",
                    start, end
                )));
            }
        }
        Ok(())
    }

    pub fn cleaning_options(&self) -> CleaningOptions {
        CleaningOptions {
            min_rows: self.min_rows,
            unknown_labels: self.unknown_labels,
            window_start: self.window_start,
            window_end: self.window_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.power_user_percentile, dec!(0.8));
        assert_eq!(config.min_rows, 10);
        assert_eq!(config.output_dir, PathBuf::from("docs/reports"));
    }

    #[test]
    fn test_rejects_bad_percentile_and_window() {
        let mut config = PipelineConfig::default();
        config.power_user_percentile = dec!(1);
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));

        config.power_user_percentile = dec!(0.9);
        config.window_start = NaiveDate::from_ymd_opt(2015, 1, 1);
        config.window_end = NaiveDate::from_ymd_opt(2014, 1, 1);
        assert!(config.validate().is_err());

        config.window_end = None;
        config.min_rows = 0;
        assert!(config.validate().is_err());
    }
}
