//! Revenue and profit per product category with share of total

use super::{ratio, Totals};
use crate::error::AnalyticsError;
use crate::model::{Category, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: Category,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub quantity: u64,
    pub margin: Option<Decimal>,
    /// Share of grand total revenue
    pub revenue_share: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    /// Categories by revenue, largest first; ties by name
    pub categories: Vec<CategoryShare>,
    pub total_revenue: Decimal,
    pub total_profit: Decimal,
}

impl CategoryReport {
    /// Category with the highest profit
    pub fn most_profitable(&self) -> Option<&CategoryShare> {
        self.categories.iter().max_by(|a, b| {
            a.profit
                .cmp(&b.profit)
                .then_with(|| b.category.name().cmp(a.category.name()))
        })
    }
}

pub fn category_breakdown(transactions: &[Transaction]) -> Result<CategoryReport, AnalyticsError> {
    let mut groups: BTreeMap<Category, Totals> = BTreeMap::new();
    let mut grand = Totals::default();
    for transaction in transactions {
        groups.entry(transaction.category).or_default().add(transaction)?;
        grand.add(transaction)?;
    }

    let mut categories: Vec<CategoryShare> = groups
        .into_iter()
        .map(|(category, totals)| CategoryShare {
            category,
            revenue: totals.revenue,
            profit: totals.profit,
            quantity: totals.quantity,
            margin: totals.margin(),
            revenue_share: ratio(totals.revenue, grand.revenue),
        })
        .collect();
    categories.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.category.name().cmp(b.category.name()))
    });

    Ok(CategoryReport {
        categories,
        total_revenue: grand.revenue,
        total_profit: grand.profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::tx;
    use crate::model::Region;
    use rust_decimal_macros::dec;

    fn sale(category: Category, revenue: Decimal, profit: Decimal) -> Transaction {
        tx((2014, 5, 1), Region::West, category, "A", revenue, profit)
    }

    #[test]
    fn test_partition_sums_to_total() {
        let data = vec![
            sale(Category::Furniture, dec!(120.10), dec!(5)),
            sale(Category::Technology, dec!(999.99), dec!(300)),
            sale(Category::OfficeSupplies, dec!(0.01), dec!(-1)),
            sale(Category::Furniture, dec!(79.90), dec!(7)),
        ];

        let report = category_breakdown(&data).unwrap();
        let sum: Decimal = report.categories.iter().map(|c| c.revenue).sum();
        assert_eq!(sum, report.total_revenue);
        assert_eq!(report.total_revenue, dec!(1200.00));

        let shares: Decimal = report.categories.iter().filter_map(|c| c.revenue_share).sum();
        assert!((shares - Decimal::ONE).abs() < dec!(0.0000000001));
    }

    #[test]
    fn test_sorted_by_revenue_with_shares() {
        let data = vec![
            sale(Category::Furniture, dec!(25), dec!(5)),
            sale(Category::Technology, dec!(75), dec!(3)),
        ];

        let report = category_breakdown(&data).unwrap();
        assert_eq!(report.categories[0].category, Category::Technology);
        assert_eq!(report.categories[0].revenue_share, Some(dec!(0.75)));
        assert_eq!(report.categories[1].revenue_share, Some(dec!(0.25)));
        assert_eq!(report.categories[1].margin, Some(dec!(0.2)));
        assert_eq!(report.most_profitable().unwrap().category, Category::Furniture);
    }

    #[test]
    fn test_zero_total_revenue_leaves_shares_undefined() {
        let data = vec![sale(Category::Furniture, dec!(0), dec!(0))];
        let report = category_breakdown(&data).unwrap();
        assert_eq!(report.categories[0].revenue_share, None);
        assert_eq!(report.categories[0].margin, None);
    }
}
