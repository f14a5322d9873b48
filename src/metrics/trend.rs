//! Monthly revenue trend with month-over-month growth

use super::{checked_add, checked_sub, ratio, Totals};
use crate::error::AnalyticsError;
use crate::model::{Transaction, YearMonth};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month: YearMonth,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub transactions: usize,
    pub active_customers: usize,
    /// Revenue per distinct customer; the CAC proxy of the portfolio report
    pub revenue_per_customer: Option<Decimal>,
    /// `(current - previous) / previous`, undefined for the first month and
    /// after a month without revenue
    pub growth: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    /// Consecutive months from first to last order, gaps zero-filled
    pub points: Vec<MonthlyPoint>,
    /// Mean of the defined growth rates
    pub average_growth: Option<Decimal>,
    /// Mean monthly revenue per customer over months with customers
    pub average_revenue_per_customer: Option<Decimal>,
}

pub fn monthly_trend(transactions: &[Transaction]) -> Result<MonthlyTrend, AnalyticsError> {
    let mut months: BTreeMap<YearMonth, (Totals, BTreeSet<&str>)> = BTreeMap::new();
    for transaction in transactions {
        let (totals, customers) = months.entry(transaction.month()).or_default();
        totals.add(transaction)?;
        customers.insert(transaction.customer_id.as_str());
    }

    let (Some(&first), Some(&last)) = (months.keys().next(), months.keys().next_back()) else {
        return Ok(MonthlyTrend {
            points: Vec::new(),
            average_growth: None,
            average_revenue_per_customer: None,
        });
    };

    let mut points: Vec<MonthlyPoint> = Vec::new();
    let mut month = first;
    loop {
        let (totals, customers) = months
            .get(&month)
            .map(|(totals, customers)| (*totals, customers.len()))
            .unwrap_or_default();
        let growth = match points.last() {
            Some(previous) => ratio(
                checked_sub(totals.revenue, previous.revenue)?,
                previous.revenue,
            ),
            None => None,
        };

        points.push(MonthlyPoint {
            month,
            revenue: totals.revenue,
            profit: totals.profit,
            transactions: totals.transactions,
            active_customers: customers,
            revenue_per_customer: ratio(totals.revenue, Decimal::from(customers)),
            growth,
        });

        if month == last {
            break;
        }
        month = month.next();
    }

    Ok(MonthlyTrend {
        average_growth: mean(points.iter().filter_map(|p| p.growth))?,
        average_revenue_per_customer: mean(points.iter().filter_map(|p| p.revenue_per_customer))?,
        points,
    })
}

fn mean(values: impl Iterator<Item = Decimal>) -> Result<Option<Decimal>, AnalyticsError> {
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for value in values {
        sum = checked_add(sum, value)?;
        count += 1;
    }
    Ok(ratio(sum, Decimal::from(count)))
}
