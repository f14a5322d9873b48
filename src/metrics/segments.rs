//! Revenue-ranked customer segmentation into power users and standard users

use super::{checked_sum, ratio, Totals};
use crate::error::AnalyticsError;
use crate::model::Transaction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Segment {
    PowerUser,
    Standard,
}

impl Segment {
    pub fn label(self) -> &'static str {
        match self {
            Segment::PowerUser => "Power users",
            Segment::Standard => "Standard users",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-customer totals, recomputed every run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub orders: usize,
    pub margin: Option<Decimal>,
    pub segment: Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub segment: Segment,
    pub customers: usize,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub revenue_share: Option<Decimal>,
    pub customer_share: Option<Decimal>,
    pub average_revenue: Option<Decimal>,
    pub average_orders: Option<Decimal>,
    pub margin: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationReport {
    pub percentile: Decimal,
    /// Lowest total revenue that still qualifies as a power user
    pub threshold_revenue: Option<Decimal>,
    pub power_users: SegmentStats,
    pub standard_users: SegmentStats,
    /// Customers ranked by revenue, highest first; ties by customer id
    pub customers: Vec<CustomerAggregate>,
}

impl SegmentationReport {
    pub fn total_customers(&self) -> usize {
        self.power_users.customers + self.standard_users.customers
    }
}

/// Number of customers below the cut for a nearest-rank percentile:
/// the 1-based ascending rank `ceil(percentile * n)`.
pub fn nearest_rank(percentile: Decimal, n: usize) -> usize {
    let rank = (percentile * Decimal::from(n)).ceil();
    rank.to_usize().unwrap_or(0).min(n)
}

/// Rank customers by total revenue and split off the top bucket.
///
/// With `n` customers and cut `k = nearest_rank(percentile, n)`, the `n - k`
/// highest-revenue customers are power users. Ties in revenue are broken by
/// customer id so the partition is reproducible.
pub fn segment_customers(
    transactions: &[Transaction],
    percentile: Decimal,
) -> Result<SegmentationReport, AnalyticsError> {
    let mut by_customer: BTreeMap<&str, Totals> = BTreeMap::new();
    for transaction in transactions {
        by_customer
            .entry(transaction.customer_id.as_str())
            .or_default()
            .add(transaction)?;
    }

    let mut ranked: Vec<(&str, Totals)> = by_customer.into_iter().collect();
    ranked.sort_by(|(id_a, a), (id_b, b)| b.revenue.cmp(&a.revenue).then_with(|| id_a.cmp(id_b)));

    let n = ranked.len();
    let power_count = n - nearest_rank(percentile, n);

    let customers: Vec<CustomerAggregate> = ranked
        .into_iter()
        .enumerate()
        .map(|(position, (customer_id, totals))| CustomerAggregate {
            customer_id: customer_id.to_string(),
            revenue: totals.revenue,
            profit: totals.profit,
            orders: totals.transactions,
            margin: totals.margin(),
            segment: if position < power_count {
                Segment::PowerUser
            } else {
                Segment::Standard
            },
        })
        .collect();

    let total_revenue = checked_sum(customers.iter().map(|c| c.revenue))?;
    let (power, standard) = customers.split_at(power_count);

    let power_users = bucket_stats(Segment::PowerUser, power, total_revenue, n)?;
    let standard_users = bucket_stats(Segment::Standard, standard, total_revenue, n)?;
    Ok(SegmentationReport {
        percentile,
        threshold_revenue: power.last().map(|c| c.revenue),
        power_users,
        standard_users,
        customers,
    })
}

fn bucket_stats(
    segment: Segment,
    members: &[CustomerAggregate],
    total_revenue: Decimal,
    total_customers: usize,
) -> Result<SegmentStats, AnalyticsError> {
    let revenue = checked_sum(members.iter().map(|c| c.revenue))?;
    let profit = checked_sum(members.iter().map(|c| c.profit))?;
    let orders: usize = members.iter().map(|c| c.orders).sum();
    let count = Decimal::from(members.len());

    Ok(SegmentStats {
        segment,
        customers: members.len(),
        revenue,
        profit,
        revenue_share: ratio(revenue, total_revenue),
        customer_share: ratio(count, Decimal::from(total_customers)),
        average_revenue: ratio(revenue, count),
        average_orders: ratio(Decimal::from(orders), count),
        margin: ratio(profit, revenue),
    })
}
