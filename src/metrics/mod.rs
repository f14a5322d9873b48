//! Business metrics over cleaned transactions.
//!
//! Each computation is a pure function of `&[Transaction]`. Money is summed as
//! `Decimal`; ratios stay unrounded and undefined ratios are `None`.

pub mod category;
pub mod regional;
pub mod segments;
pub mod trend;

use crate::error::AnalyticsError;
use crate::model::Transaction;
use rust_decimal::Decimal;
use serde::Serialize;

pub use category::{category_breakdown, CategoryReport, CategoryShare};
pub use regional::{regional_margins, MarginGap, RegionCategoryCell, RegionMargin, RegionalReport};
pub use segments::{segment_customers, CustomerAggregate, Segment, SegmentStats, SegmentationReport};
pub use trend::{monthly_trend, MonthlyPoint, MonthlyTrend};

/// `numerator / denominator`, or `None` when the denominator is zero
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        numerator.checked_div(denominator)
    }
}

/// Sum that fails instead of overflowing the decimal range
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal, AnalyticsError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |sum, value| checked_add(sum, value))
}

pub(crate) fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, AnalyticsError> {
    a.checked_add(b).ok_or_else(|| overflow("sum", a, b))
}

pub(crate) fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, AnalyticsError> {
    a.checked_sub(b).ok_or_else(|| overflow("difference", a, b))
}

fn overflow(operation: &str, a: Decimal, b: Decimal) -> AnalyticsError {
    AnalyticsError::Computation(format!(
        "{} of {} and {} exceeds the decimal range",
        operation, a, b
    ))
}

/// Running sums for one group of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub revenue: Decimal,
    pub profit: Decimal,
    pub quantity: u64,
    pub transactions: usize,
}

impl Totals {
    pub fn add(&mut self, transaction: &Transaction) -> Result<(), AnalyticsError> {
        self.revenue = checked_add(self.revenue, transaction.sales_amount)?;
        self.profit = checked_add(self.profit, transaction.profit)?;
        self.quantity += u64::from(transaction.quantity);
        self.transactions += 1;
        Ok(())
    }

    /// Profit over revenue; undefined for zero revenue
    pub fn margin(&self) -> Option<Decimal> {
        ratio(self.profit, self.revenue)
    }
}

/// All four reports computed from one cleaned table
#[derive(Debug, Clone, Serialize)]
pub struct Reports {
    pub trend: MonthlyTrend,
    pub regional: RegionalReport,
    pub category: CategoryReport,
    pub segmentation: SegmentationReport,
}

impl Reports {
    pub fn compute(
        transactions: &[Transaction],
        power_user_percentile: Decimal,
    ) -> Result<Self, AnalyticsError> {
        Ok(Self {
            trend: monthly_trend(transactions)?,
            regional: regional_margins(transactions)?,
            category: category_breakdown(transactions)?,
            segmentation: segment_customers(transactions, power_user_percentile)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Category, Region, Transaction};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    pub fn tx(
        date: (i32, u32, u32),
        region: Region,
        category: Category,
        customer: &str,
        sales: Decimal,
        profit: Decimal,
    ) -> Transaction {
        Transaction {
            order_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            region,
            category,
            customer_id: customer.to_string(),
            sales_amount: sales,
            profit,
            quantity: 1,
            discount: None,
            shipping_cost: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::tx;
    use super::*;
    use crate::model::{Category, Region};
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratio_guards_zero() {
        assert_eq!(ratio(dec!(26.6), dec!(100)), Some(dec!(0.266)));
        assert_eq!(ratio(dec!(5), Decimal::ZERO), None);
        assert_eq!(ratio(Decimal::ZERO, dec!(5)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_zero_revenue_margin_is_undefined() {
        let totals = Totals {
            profit: dec!(-3),
            ..Default::default()
        };
        assert_eq!(totals.margin(), None);
    }

    #[test]
    fn test_overflowing_sums_are_computation_errors() {
        let huge = dec!(50000000000000000000000000000);
        let data = vec![
            tx((2014, 1, 1), Region::East, Category::Furniture, "A", huge, dec!(1)),
            tx((2014, 1, 2), Region::East, Category::Furniture, "B", huge, dec!(1)),
        ];

        let err = Reports::compute(&data, dec!(0.8)).unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));
        assert!(checked_sum([huge, huge]).is_err());
        assert_eq!(checked_sum([dec!(1.5), dec!(2)]).unwrap(), dec!(3.5));
    }
}
