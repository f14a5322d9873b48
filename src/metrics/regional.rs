//! Regional profit margins and the top-to-bottom margin gap

use super::{checked_sub, Totals};
use crate::error::AnalyticsError;
use crate::model::{Category, Region, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionMargin {
    pub region: Region,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub quantity: u64,
    pub transactions: usize,
    pub margin: Option<Decimal>,
}

/// Spread between the best and worst region margin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginGap {
    pub top: Region,
    pub top_margin: Decimal,
    pub bottom: Region,
    pub bottom_margin: Decimal,
    /// Difference of the two margins as a ratio
    pub gap: Decimal,
    /// The same difference in percentage points
    pub gap_points: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCategoryCell {
    pub region: Region,
    pub category: Category,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub margin: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalReport {
    /// Regions by margin, best first; ties by name, undefined margins last
    pub ranking: Vec<RegionMargin>,
    pub gap: Option<MarginGap>,
    pub cells: Vec<RegionCategoryCell>,
}

pub fn regional_margins(transactions: &[Transaction]) -> Result<RegionalReport, AnalyticsError> {
    let mut regions: BTreeMap<Region, Totals> = BTreeMap::new();
    let mut cells: BTreeMap<(&str, &str), (Region, Category, Totals)> = BTreeMap::new();
    for transaction in transactions {
        regions.entry(transaction.region).or_default().add(transaction)?;
        cells
            .entry((transaction.region.name(), transaction.category.name()))
            .or_insert_with(|| (transaction.region, transaction.category, Totals::default()))
            .2
            .add(transaction)?;
    }

    let mut ranking: Vec<RegionMargin> = regions
        .into_iter()
        .map(|(region, totals)| RegionMargin {
            region,
            revenue: totals.revenue,
            profit: totals.profit,
            quantity: totals.quantity,
            transactions: totals.transactions,
            margin: totals.margin(),
        })
        .collect();
    ranking.sort_by(|a, b| {
        compare_margin_desc(a.margin, b.margin).then_with(|| a.region.name().cmp(b.region.name()))
    });

    Ok(RegionalReport {
        gap: margin_gap(&ranking)?,
        ranking,
        cells: cells
            .into_values()
            .map(|(region, category, totals)| RegionCategoryCell {
                region,
                category,
                revenue: totals.revenue,
                profit: totals.profit,
                margin: totals.margin(),
            })
            .collect(),
    })
}

/// Defined margins descending, undefined after all defined ones
fn compare_margin_desc(a: Option<Decimal>, b: Option<Decimal>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn margin_gap(ranking: &[RegionMargin]) -> Result<Option<MarginGap>, AnalyticsError> {
    let mut defined = ranking
        .iter()
        .filter_map(|r| r.margin.map(|margin| (r.region, margin)));
    let Some((top, top_margin)) = defined.next() else {
        return Ok(None);
    };
    let (bottom, bottom_margin) = defined.last().unwrap_or((top, top_margin));

    let gap = checked_sub(top_margin, bottom_margin)?;
    let gap_points = gap.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(|| {
        AnalyticsError::Computation(format!("margin gap {} exceeds the decimal range", gap))
    })?;
    Ok(Some(MarginGap {
        top,
        top_margin,
        bottom,
        bottom_margin,
        gap,
        gap_points,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::tx;
    use rust_decimal_macros::dec;

    fn sale(region: Region, revenue: Decimal, profit: Decimal) -> Transaction {
        tx((2014, 1, 1), region, Category::Technology, "C", revenue, profit)
    }

    #[test]
    fn test_canada_vs_southeast_asia_gap() {
        let data = vec![
            sale(Region::SoutheastAsia, dec!(60), dec!(-1.3)),
            sale(Region::Canada, dec!(100), dec!(26.6)),
            sale(Region::SoutheastAsia, dec!(40), dec!(-1.0)),
            sale(Region::Central, dec!(200), dec!(20)),
        ];

        let report = regional_margins(&data).unwrap();
        let order: Vec<Region> = report.ranking.iter().map(|r| r.region).collect();
        assert_eq!(order, vec![Region::Canada, Region::Central, Region::SoutheastAsia]);
        assert_eq!(report.ranking[0].margin, Some(dec!(0.266)));
        assert_eq!(report.ranking[2].margin, Some(dec!(-0.023)));

        let gap = report.gap.unwrap();
        assert_eq!(gap.top, Region::Canada);
        assert_eq!(gap.bottom, Region::SoutheastAsia);
        assert_eq!(gap.gap, dec!(0.289));
        assert_eq!(gap.gap_points, dec!(28.9));
    }

    #[test]
    fn test_ties_break_by_region_name() {
        let data = vec![
            sale(Region::West, dec!(100), dec!(10)),
            sale(Region::East, dec!(200), dec!(20)),
            sale(Region::Africa, dec!(50), dec!(5)),
        ];

        let first = regional_margins(&data).unwrap();
        let order: Vec<&str> = first.ranking.iter().map(|r| r.region.name()).collect();
        assert_eq!(order, vec!["Africa", "East", "West"]);

        let mut reversed = data.clone();
        reversed.reverse();
        assert_eq!(regional_margins(&reversed).unwrap(), first);
    }

    #[test]
    fn test_zero_revenue_region_has_no_margin_and_ranks_last() {
        let data = vec![
            sale(Region::North, dec!(0), dec!(-4)),
            sale(Region::South, dec!(100), dec!(-50)),
        ];

        let report = regional_margins(&data).unwrap();
        assert_eq!(report.ranking[1].region, Region::North);
        assert_eq!(report.ranking[1].margin, None);
        let gap = report.gap.unwrap();
        assert_eq!(gap.top, Region::South);
        assert_eq!(gap.bottom, Region::South);
        assert_eq!(gap.gap, Decimal::ZERO);
    }

    #[test]
    fn test_region_category_cells() {
        let data = vec![
            tx((2014, 1, 1), Region::East, Category::Furniture, "A", dec!(100), dec!(10)),
            tx((2014, 1, 2), Region::East, Category::Technology, "A", dec!(50), dec!(25)),
            tx((2014, 1, 3), Region::East, Category::Furniture, "B", dec!(100), dec!(30)),
        ];

        let report = regional_margins(&data).unwrap();
        assert_eq!(report.cells.len(), 2);
        assert_eq!(report.cells[0].category, Category::Furniture);
        assert_eq!(report.cells[0].revenue, dec!(200));
        assert_eq!(report.cells[0].margin, Some(dec!(0.2)));
        assert_eq!(report.cells[1].margin, Some(dec!(0.5)));
    }

    #[test]
    fn test_gap_beyond_decimal_range_is_an_error() {
        let extreme = dec!(70000000000000000000000000000);
        let data = vec![
            sale(Region::North, dec!(1), extreme),
            sale(Region::South, dec!(1), -extreme),
        ];

        let err = regional_margins(&data).unwrap_err();
        assert!(matches!(err, AnalyticsError::Computation(_)));
    }
}
