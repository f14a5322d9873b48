//! Plain-text business summary printed at the end of a run

use crate::clean::CleaningReport;
use crate::metrics::Reports;
use crate::viz::{format_money, format_percent, format_points};
use rust_decimal::Decimal;
use std::fmt;

const RULE_WIDTH: usize = 80;

/// Console summary: business health, regions, segments, categories
pub struct Summary<'a> {
    pub reports: &'a Reports,
    pub cleaning: &'a CleaningReport,
}

pub fn summary<'a>(reports: &'a Reports, cleaning: &'a CleaningReport) -> Summary<'a> {
    Summary { reports, cleaning }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Summary { reports, cleaning } = *self;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(out, "{}", rule)?;
        writeln!(out, "SALES INSIGHTS")?;
        writeln!(out, "{}", rule)?;

        writeln!(out, "\n0. DATA")?;
        writeln!(
            out,
            "   Rows analysed: {} of {} ({} dropped, {} values imputed)",
            cleaning.kept_rows,
            cleaning.input_rows,
            cleaning.dropped_rows(),
            cleaning.imputed_cells()
        )?;
        for fallback in &cleaning.fallbacks {
            writeln!(
                out,
                "   Global median used for {} in {} ({} rows)",
                fallback.field.name(),
                fallback.category,
                fallback.rows
            )?;
        }

        writeln!(out, "\n1. BUSINESS HEALTH METRICS")?;
        writeln!(
            out,
            "   MRR Growth Rate: {}",
            format_percent(reports.trend.average_growth)
        )?;
        writeln!(
            out,
            "   Total Revenue: {}",
            format_money(reports.category.total_revenue)
        )?;
        writeln!(
            out,
            "   Total Profit: {}",
            format_money(reports.category.total_profit)
        )?;
        writeln!(
            out,
            "   Average CAC (revenue per customer per month): {}",
            reports
                .trend
                .average_revenue_per_customer
                .map(format_money)
                .unwrap_or_else(|| "n/a".to_string())
        )?;

        writeln!(out, "\n2. REGIONAL PERFORMANCE")?;
        match &reports.regional.gap {
            Some(gap) => {
                writeln!(
                    out,
                    "   Best Region: {} ({} margin)",
                    gap.top,
                    format_percent(Some(gap.top_margin))
                )?;
                writeln!(
                    out,
                    "   Needs Attention: {} ({} margin)",
                    gap.bottom,
                    format_percent(Some(gap.bottom_margin))
                )?;
                writeln!(
                    out,
                    "   Margin Gap: {} percentage points",
                    format_points(gap.gap_points)
                )?;
            }
            None => {
                writeln!(out, "   No region recorded revenue")?;
            }
        }

        writeln!(out, "\n3. CUSTOMER SEGMENTATION")?;
        let segments = &reports.segmentation;
        writeln!(
            out,
            "   Power Users (top {}): {} customers driving {} of revenue",
            format_percent(Some(Decimal::ONE - segments.percentile)),
            segments.power_users.customers,
            format_percent(segments.power_users.revenue_share)
        )?;
        for stats in [&segments.power_users, &segments.standard_users] {
            writeln!(
                out,
                "   Avg Revenue per {}: {}",
                stats.segment,
                stats
                    .average_revenue
                    .map(format_money)
                    .unwrap_or_else(|| "n/a".to_string())
            )?;
        }

        writeln!(out, "\n4. PRODUCT CATEGORY PERFORMANCE")?;
        if let Some(top) = reports.category.most_profitable() {
            writeln!(
                out,
                "   Top Category: {} ({} profit)",
                top.category,
                format_money(top.profit)
            )?;
        }

        writeln!(out, "\n{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::tx;
    use crate::model::{Category, Region};
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_names_best_and_worst_region() {
        let data = vec![
            tx((2014, 1, 1), Region::Canada, Category::Technology, "A", dec!(100), dec!(26.6)),
            tx((2014, 2, 1), Region::SoutheastAsia, Category::Furniture, "B", dec!(100), dec!(-2.3)),
        ];
        let reports = Reports::compute(&data, dec!(0.8)).unwrap();
        let cleaning = CleaningReport {
            input_rows: 3,
            kept_rows: 2,
            ..Default::default()
        };

        let text = summary(&reports, &cleaning).to_string();
        assert!(text.contains("Best Region: Canada (26.60% margin)"));
        assert!(text.contains("Needs Attention: Southeast Asia (-2.30% margin)"));
        assert!(text.contains("Margin Gap: 28.90 percentage points"));
        assert!(text.contains("Rows analysed: 2 of 3"));
        assert!(text.contains("Top Category: Technology"));
    }

    #[test]
    fn test_gap_is_rounded_like_the_report() {
        let data = vec![
            tx((2014, 1, 1), Region::Canada, Category::Technology, "A", dec!(1000), dec!(289.99)),
            tx((2014, 1, 2), Region::East, Category::Technology, "B", dec!(1000), dec!(0)),
        ];
        let reports = Reports::compute(&data, dec!(0.8)).unwrap();
        let cleaning = CleaningReport::default();

        let text = summary(&reports, &cleaning).to_string();
        assert!(text.contains("Margin Gap: 29.00 percentage points"), "{}", text);
    }
}
