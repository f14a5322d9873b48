//! Row validation, parsing and category-scoped median imputation

use crate::data::{Field, RawRecord, RawTable};
use crate::error::AnalyticsError;
use crate::model::{Category, Region, Transaction, UnknownLabelPolicy};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const MISSING_MARKERS: [&str; 5] = ["na", "n/a", "nan", "null", "none"];

/// Knobs of the cleaning stage
#[derive(Debug, Clone)]
pub struct CleaningOptions {
    /// Minimum number of rows that must survive cleaning
    pub min_rows: usize,
    pub unknown_labels: UnknownLabelPolicy,
    /// Inclusive analysis window; rows dated outside it are dropped
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            min_rows: 10,
            unknown_labels: UnknownLabelPolicy::Other,
            window_start: None,
            window_end: None,
        }
    }
}

/// Why a row was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DropReason {
    MissingKey(Field),
    UnparseableDate,
    OutsideWindow,
    NegativeSales,
    NonPositiveQuantity,
    QuantityOutOfRange,
}

impl DropReason {
    pub fn describe(self) -> String {
        match self {
            DropReason::MissingKey(field) => format!("missing {}", field.name()),
            DropReason::UnparseableDate => "unparseable order date".to_string(),
            DropReason::OutsideWindow => "outside analysis window".to_string(),
            DropReason::NegativeSales => "negative sales amount".to_string(),
            DropReason::NonPositiveQuantity => "non-positive quantity".to_string(),
            DropReason::QuantityOutOfRange => "quantity too large".to_string(),
        }
    }
}

/// A category had no observed value for a field, so the global median was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImputationFallback {
    pub field: Field,
    pub category: Category,
    pub rows: usize,
}

/// What cleaning did to the raw table
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub kept_rows: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Imputed cell count per field name
    pub imputed: BTreeMap<&'static str, usize>,
    pub fallbacks: Vec<ImputationFallback>,
    /// Rows whose region or category label was bucketed as `Other`
    pub relabeled_other: usize,
}

impl CleaningReport {
    pub fn dropped_rows(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn imputed_cells(&self) -> usize {
        self.imputed.values().sum()
    }
}

#[derive(Debug)]
pub struct CleanedData {
    pub transactions: Vec<Transaction>,
    pub report: CleaningReport,
}

/// A row whose keys are valid but whose numeric cells may still be missing
struct PartialRow {
    order_date: NaiveDate,
    region: Region,
    category: Category,
    customer_id: String,
    sales_amount: Option<Decimal>,
    profit: Option<Decimal>,
    quantity: Option<Decimal>,
    discount: Option<Decimal>,
    shipping_cost: Option<Decimal>,
}

impl PartialRow {
    fn value(&self, field: Field) -> Option<Decimal> {
        match field {
            Field::SalesAmount => self.sales_amount,
            Field::Profit => self.profit,
            Field::Quantity => self.quantity,
            Field::Discount => self.discount,
            Field::ShippingCost => self.shipping_cost,
            _ => None,
        }
    }

    fn value_mut(&mut self, field: Field) -> Option<&mut Option<Decimal>> {
        match field {
            Field::SalesAmount => Some(&mut self.sales_amount),
            Field::Profit => Some(&mut self.profit),
            Field::Quantity => Some(&mut self.quantity),
            Field::Discount => Some(&mut self.discount),
            Field::ShippingCost => Some(&mut self.shipping_cost),
            _ => None,
        }
    }
}

/// Turn the raw table into validated transactions.
///
/// Rows with a missing or invalid key are dropped and counted. Missing numeric
/// cells are filled with the median of the same field within the same
/// category, or the global median when the category has no observation.
pub fn clean(raw: &RawTable, options: &CleaningOptions) -> Result<CleanedData, AnalyticsError> {
    info!("Cleaning {} rows", raw.len());

    let mut report = CleaningReport {
        input_rows: raw.len(),
        ..Default::default()
    };

    let mut rows = Vec::with_capacity(raw.len());
    for (index, record) in raw.records.iter().enumerate() {
        match parse_row(record, index, options, &mut report)? {
            Ok(row) => rows.push(row),
            Err(reason) => *report.dropped.entry(reason).or_insert(0) += 1,
        }
    }

    let mut numeric_fields = vec![Field::SalesAmount, Field::Profit, Field::Quantity];
    if raw.has_discount {
        numeric_fields.push(Field::Discount);
    }
    if raw.has_shipping_cost {
        numeric_fields.push(Field::ShippingCost);
    }
    for field in numeric_fields {
        let required = Field::REQUIRED.contains(&field);
        impute_field(&mut rows, field, required, &mut report)?;
    }

    let mut transactions = Vec::with_capacity(rows.len());
    for row in rows {
        match finish_row(row) {
            Ok(transaction) => transactions.push(transaction),
            Err(reason) => *report.dropped.entry(reason).or_insert(0) += 1,
        }
    }
    report.kept_rows = transactions.len();

    for (reason, count) in &report.dropped {
        warn!("Dropped {} row(s): {}", count, reason.describe());
    }
    if report.relabeled_other > 0 {
        warn!(
            "{} row(s) had an unrecognised region or category and were bucketed as Other",
            report.relabeled_other
        );
    }

    if transactions.len() < options.min_rows {
        return Err(AnalyticsError::DataQuality(format!(
            "only {} of {} rows survived cleaning, at least {} required",
            transactions.len(),
            raw.len(),
            options.min_rows
        )));
    }

    info!(
        "Kept {} rows, dropped {}, imputed {} cells",
        report.kept_rows,
        report.dropped_rows(),
        report.imputed_cells()
    );

    Ok(CleanedData {
        transactions,
        report,
    })
}

/// Outer error is fatal, inner error drops the row
fn parse_row(
    record: &RawRecord,
    index: usize,
    options: &CleaningOptions,
    report: &mut CleaningReport,
) -> Result<Result<PartialRow, DropReason>, AnalyticsError> {
    let (customer_id, date_text, region_label, category_label) = match key_cells(record) {
        Ok(keys) => keys,
        Err(reason) => return Ok(Err(reason)),
    };

    let Some(order_date) = parse_date(date_text) else {
        return Ok(Err(DropReason::UnparseableDate));
    };
    let before_start = options.window_start.is_some_and(|start| order_date < start);
    let after_end = options.window_end.is_some_and(|end| order_date > end);
    if before_start || after_end {
        return Ok(Err(DropReason::OutsideWindow));
    }

    let mut relabeled = false;
    let region = match Region::from_label(region_label) {
        Some(region) => region,
        None => {
            resolve_unknown(options.unknown_labels, Field::Region, region_label, index)?;
            relabeled = true;
            Region::Other
        }
    };
    let category = match Category::from_label(category_label) {
        Some(category) => category,
        None => {
            resolve_unknown(options.unknown_labels, Field::Category, category_label, index)?;
            relabeled = true;
            Category::Other
        }
    };
    if relabeled {
        report.relabeled_other += 1;
    }

    let number = |field: Field| present(record.get(field)).and_then(parse_decimal);

    let sales_amount = number(Field::SalesAmount);
    if sales_amount.is_some_and(|sales| sales < Decimal::ZERO) {
        return Ok(Err(DropReason::NegativeSales));
    }
    let quantity = number(Field::Quantity);
    if quantity.is_some_and(|quantity| quantity <= Decimal::ZERO) {
        return Ok(Err(DropReason::NonPositiveQuantity));
    }

    Ok(Ok(PartialRow {
        order_date,
        region,
        category,
        customer_id: customer_id.to_string(),
        sales_amount,
        profit: number(Field::Profit),
        quantity,
        discount: number(Field::Discount),
        shipping_cost: number(Field::ShippingCost),
    }))
}

/// Customer id, date, region and category, in the order they are checked
fn key_cells(record: &RawRecord) -> Result<(&str, &str, &str, &str), DropReason> {
    let key = |field: Field| present(record.get(field)).ok_or(DropReason::MissingKey(field));
    Ok((
        key(Field::CustomerId)?,
        key(Field::OrderDate)?,
        key(Field::Region)?,
        key(Field::Category)?,
    ))
}

fn resolve_unknown(
    policy: UnknownLabelPolicy,
    field: Field,
    label: &str,
    index: usize,
) -> Result<(), AnalyticsError> {
    match policy {
        UnknownLabelPolicy::Other => {
            debug!("Row {}: unrecognised {} '{}'", index + 1, field.name(), label);
            Ok(())
        }
        UnknownLabelPolicy::Reject => Err(AnalyticsError::DataQuality(format!(
            "unrecognised {} '{}' in data row {}",
            field.name(),
            label,
            index + 1
        ))),
    }
}

/// Fill missing values of `field` with the per-category median
fn impute_field(
    rows: &mut [PartialRow],
    field: Field,
    required: bool,
    report: &mut CleaningReport,
) -> Result<(), AnalyticsError> {
    let missing = rows.iter().filter(|row| row.value(field).is_none()).count();
    if missing == 0 {
        return Ok(());
    }

    let mut by_category: BTreeMap<Category, Vec<Decimal>> = BTreeMap::new();
    let mut all = Vec::new();
    for row in rows.iter() {
        if let Some(value) = row.value(field) {
            by_category.entry(row.category).or_default().push(value);
            all.push(value);
        }
    }

    let Some(global) = median(&mut all) else {
        if required {
            return Err(AnalyticsError::DataQuality(format!(
                "column {} has no usable values to impute from",
                field.name()
            )));
        }
        debug!("Optional column {} is entirely empty, leaving it unset", field.name());
        return Ok(());
    };

    let medians: BTreeMap<Category, Decimal> = by_category
        .into_iter()
        .filter_map(|(category, mut values)| median(&mut values).map(|m| (category, m)))
        .collect();

    let mut fallback_rows: BTreeMap<Category, usize> = BTreeMap::new();
    for row in rows.iter_mut() {
        let category = row.category;
        let Some(slot) = row.value_mut(field) else { continue };
        if slot.is_some() {
            continue;
        }
        let fill = match medians.get(&category) {
            Some(median) => *median,
            None => {
                *fallback_rows.entry(category).or_insert(0) += 1;
                global
            }
        };
        *slot = Some(fill);
    }

    *report.imputed.entry(field.name()).or_insert(0) += missing;
    for (category, count) in fallback_rows {
        warn!(
            "No {} values observed for category {}; imputed {} row(s) with the global median {}",
            field.name(),
            category,
            count,
            global
        );
        report.fallbacks.push(ImputationFallback {
            field,
            category,
            rows: count,
        });
    }
    debug!("Imputed {} missing {} value(s)", missing, field.name());

    Ok(())
}

fn finish_row(row: PartialRow) -> Result<Transaction, DropReason> {
    // Imputation guarantees the required slots are filled.
    let sales_amount = row.sales_amount.unwrap_or_default();
    let profit = row.profit.unwrap_or_default();

    // Fractional quantities round to the nearest whole unit, never below one.
    let quantity = row
        .quantity
        .unwrap_or_default()
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ONE)
        .to_u32()
        .ok_or(DropReason::QuantityOutOfRange)?;

    Ok(Transaction {
        order_date: row.order_date,
        region: row.region,
        category: row.category,
        customer_id: row.customer_id,
        sales_amount,
        profit,
        quantity,
        discount: row.discount,
        shipping_cost: row.shipping_cost,
    })
}

/// Trimmed cell text, or `None` for blanks and missing markers
fn present(cell: Option<&str>) -> Option<&str> {
    let text = cell?.trim();
    if text.is_empty() || MISSING_MARKERS.contains(&text.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

/// Parse a decimal in plain or scientific notation, tolerating thousands separators
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '$').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

/// Parse an order date in any of the layouts seen in sales exports
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Exact median; averages the two middle values for even counts
pub fn median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        let (low, high) = (values[mid - 1], values[mid]);
        let midpoint = match low.checked_add(high) {
            Some(sum) => sum / Decimal::TWO,
            // Only same-sign values overflow, and their difference cannot.
            None => low + (high - low) / Decimal::TWO,
        };
        Some(midpoint)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(
        date: &str,
        region: &str,
        category: &str,
        customer: &str,
        sales: &str,
        profit: &str,
        quantity: &str,
    ) -> RawRecord {
        let cell = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        RawRecord {
            order_date: cell(date),
            region: cell(region),
            category: cell(category),
            customer_id: cell(customer),
            sales_amount: cell(sales),
            profit: cell(profit),
            quantity: cell(quantity),
            discount: None,
            shipping_cost: None,
        }
    }

    fn table(records: Vec<RawRecord>) -> RawTable {
        RawTable {
            source: "test.csv".into(),
            records,
            has_discount: false,
            has_shipping_cost: false,
        }
    }

    fn lenient() -> CleaningOptions {
        CleaningOptions {
            min_rows: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [dec!(3), dec!(1), dec!(2)]), Some(dec!(2)));
        assert_eq!(median(&mut [dec!(4), dec!(1), dec!(3), dec!(2)]), Some(dec!(2.5)));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_parse_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2012, 7, 31);
        assert_eq!(parse_date("2012-07-31"), expected);
        assert_eq!(parse_date("31-07-2012"), expected);
        assert_eq!(parse_date("7/31/2012"), expected);
        assert_eq!(parse_date("2012-07-31T08:26:00Z"), expected);
        assert_eq!(parse_date("2012-07-31 08:26:00"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2012-02-30"), None);
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(parse_decimal("221.98"), Some(dec!(221.98)));
        assert_eq!(parse_decimal("-2.3"), Some(dec!(-2.3)));
        assert_eq!(parse_decimal("1,234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal("1.5e2"), Some(dec!(150)));
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_category_scoped_median_imputation() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "10", "1"),
            record("2014-01-02", "East", "Furniture", "B", "100", "30", "1"),
            record("2014-01-03", "East", "Furniture", "C", "100", "", "1"),
            record("2014-01-04", "West", "Technology", "D", "100", "500", "1"),
            record("2014-01-05", "West", "Technology", "E", "100", "NaN", "1"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        let profits: Vec<Decimal> = cleaned.transactions.iter().map(|t| t.profit).collect();
        // Furniture median is 20, not the global median of 30
        assert_eq!(profits, vec![dec!(10), dec!(30), dec!(20), dec!(500), dec!(500)]);
        assert_eq!(cleaned.report.imputed.get("profit"), Some(&2));
        assert!(cleaned.report.fallbacks.is_empty());
    }

    #[test]
    fn test_all_missing_category_falls_back_to_global_median() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "10", "1"),
            record("2014-01-02", "East", "Furniture", "B", "100", "20", "1"),
            record("2014-01-03", "East", "Furniture", "C", "100", "90", "1"),
            record("2014-01-04", "West", "Technology", "D", "100", "", "1"),
            record("2014-01-05", "West", "Technology", "E", "100", "", "1"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        let tech: Vec<Decimal> = cleaned
            .transactions
            .iter()
            .filter(|t| t.category == Category::Technology)
            .map(|t| t.profit)
            .collect();
        assert_eq!(tech, vec![dec!(20), dec!(20)]);
        assert_eq!(
            cleaned.report.fallbacks,
            vec![ImputationFallback {
                field: Field::Profit,
                category: Category::Technology,
                rows: 2,
            }]
        );
    }

    #[test]
    fn test_rows_missing_keys_are_dropped_and_counted() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "10", "1"),
            record("2014-01-02", "East", "Furniture", "", "100", "10", "1"),
            record("", "East", "Furniture", "B", "100", "10", "1"),
            record("2014-01-03", "", "Furniture", "C", "100", "10", "1"),
            record("2014-01-03", "East", "  ", "D", "100", "10", "1"),
            record("someday", "East", "Furniture", "E", "100", "10", "1"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        let report = &cleaned.report;
        assert_eq!(report.input_rows, 6);
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.dropped_rows(), 5);
        assert_eq!(
            report.dropped.get(&DropReason::MissingKey(Field::CustomerId)),
            Some(&1)
        );
        assert_eq!(report.dropped.get(&DropReason::UnparseableDate), Some(&1));
    }

    #[test]
    fn test_malformed_numbers_are_dropped() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "10", "2"),
            record("2014-01-02", "East", "Furniture", "B", "-5", "10", "2"),
            record("2014-01-03", "East", "Furniture", "C", "100", "10", "0"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        assert_eq!(cleaned.transactions.len(), 1);
        assert_eq!(cleaned.report.dropped.get(&DropReason::NegativeSales), Some(&1));
        assert_eq!(
            cleaned.report.dropped.get(&DropReason::NonPositiveQuantity),
            Some(&1)
        );
    }

    #[test]
    fn test_window_filters_dates() {
        let raw = table(vec![
            record("2013-12-31", "East", "Furniture", "A", "100", "10", "1"),
            record("2014-01-01", "East", "Furniture", "B", "100", "10", "1"),
            record("2014-12-31", "East", "Furniture", "C", "100", "10", "1"),
            record("2015-01-01", "East", "Furniture", "D", "100", "10", "1"),
        ]);
        let options = CleaningOptions {
            window_start: NaiveDate::from_ymd_opt(2014, 1, 1),
            window_end: NaiveDate::from_ymd_opt(2014, 12, 31),
            ..lenient()
        };

        let cleaned = clean(&raw, &options).unwrap();
        let customers: Vec<&str> = cleaned
            .transactions
            .iter()
            .map(|t| t.customer_id.as_str())
            .collect();
        assert_eq!(customers, vec!["B", "C"]);
        assert_eq!(cleaned.report.dropped.get(&DropReason::OutsideWindow), Some(&2));
    }

    #[test]
    fn test_unknown_labels_policy() {
        let raw = table(vec![
            record("2014-01-01", "Atlantis", "Furniture", "A", "100", "10", "1"),
            record("2014-01-02", "East", "Furniture", "B", "100", "10", "1"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        assert_eq!(cleaned.transactions[0].region, Region::Other);
        assert_eq!(cleaned.report.relabeled_other, 1);

        let strict = CleaningOptions {
            unknown_labels: UnknownLabelPolicy::Reject,
            ..lenient()
        };
        let err = clean(&raw, &strict).unwrap_err();
        assert!(matches!(err, AnalyticsError::DataQuality(_)));
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn test_too_few_rows_is_a_quality_error() {
        let raw = table(vec![record(
            "2014-01-01", "East", "Furniture", "A", "100", "10", "1",
        )]);

        let err = clean(&raw, &CleaningOptions::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::DataQuality(_)));
    }

    #[test]
    fn test_required_column_with_no_values_is_a_quality_error() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "", "1"),
            record("2014-01-02", "East", "Furniture", "B", "100", "", "1"),
        ]);

        let err = clean(&raw, &lenient()).unwrap_err();
        assert!(err.to_string().contains("profit"));
    }

    #[test]
    fn test_cleaning_never_grows_and_fills_required_fields() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "", "10", ""),
            record("2014-01-02", "East", "Furniture", "B", "50", "", "3"),
            record("2014-01-03", "East", "Technology", "", "70", "5", "1"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        assert!(cleaned.transactions.len() <= raw.len());
        let first = &cleaned.transactions[0];
        assert_eq!(first.sales_amount, dec!(50));
        assert_eq!(first.quantity, 3);
        assert_eq!(cleaned.transactions[1].profit, dec!(10));
    }

    #[test]
    fn test_fractional_quantities_round_to_at_least_one() {
        let raw = table(vec![
            record("2014-01-01", "East", "Furniture", "A", "100", "10", "0.4"),
            record("2014-01-02", "East", "Furniture", "B", "100", "10", "0.4"),
            record("2014-01-03", "East", "Furniture", "C", "100", "10", ""),
            record("2014-01-04", "East", "Furniture", "D", "100", "10", "2.5"),
            record("2014-01-05", "East", "Furniture", "E", "100", "10", "99999999999"),
        ]);

        let cleaned = clean(&raw, &lenient()).unwrap();
        let quantities: Vec<u32> = cleaned.transactions.iter().map(|t| t.quantity).collect();
        // median of 0.4, 0.4, 2.5 and the huge value is 1.45, rounding to 1
        assert_eq!(quantities, vec![1, 1, 1, 3]);
        assert_eq!(
            cleaned.report.dropped.get(&DropReason::QuantityOutOfRange),
            Some(&1)
        );
    }

    #[test]
    fn test_median_of_extreme_values_does_not_overflow() {
        let max = Decimal::MAX;
        assert_eq!(median(&mut [max, max]), Some(max));
        let near = max - Decimal::TWO;
        assert_eq!(median(&mut [max, near]), Some(max - Decimal::ONE));
    }
}
