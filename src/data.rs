//! CSV loading with name-based column validation using Polars

use crate::error::AnalyticsError;
use crate::model::normalize_label;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Logical columns of the transaction dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    OrderDate,
    Region,
    Category,
    CustomerId,
    SalesAmount,
    Profit,
    Quantity,
    Discount,
    ShippingCost,
}

impl Field {
    pub const REQUIRED: [Field; 7] = [
        Field::OrderDate,
        Field::Region,
        Field::Category,
        Field::CustomerId,
        Field::SalesAmount,
        Field::Profit,
        Field::Quantity,
    ];

    pub const OPTIONAL: [Field; 2] = [Field::Discount, Field::ShippingCost];

    /// Canonical column name, used in messages
    pub fn name(self) -> &'static str {
        match self {
            Field::OrderDate => "order_date",
            Field::Region => "region",
            Field::Category => "category",
            Field::CustomerId => "customer_id",
            Field::SalesAmount => "sales_amount",
            Field::Profit => "profit",
            Field::Quantity => "quantity",
            Field::Discount => "discount",
            Field::ShippingCost => "shipping_cost",
        }
    }

    /// Accepted header spellings after normalisation.
    /// Covers the Global Superstore export ("Order Date", "Sales", "Customer ID").
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::OrderDate => &["orderdate", "date"],
            Field::Region => &["region"],
            Field::Category => &["category", "productcategory"],
            Field::CustomerId => &["customerid"],
            Field::SalesAmount => &["salesamount", "sales"],
            Field::Profit => &["profit"],
            Field::Quantity => &["quantity"],
            Field::Discount => &["discount"],
            Field::ShippingCost => &["shippingcost"],
        }
    }

    fn matches(self, header: &str) -> bool {
        let header = normalize_label(header);
        self.aliases().iter().any(|alias| *alias == header)
    }
}

/// One source row with every cell kept as optional text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub order_date: Option<String>,
    pub region: Option<String>,
    pub category: Option<String>,
    pub customer_id: Option<String>,
    pub sales_amount: Option<String>,
    pub profit: Option<String>,
    pub quantity: Option<String>,
    pub discount: Option<String>,
    pub shipping_cost: Option<String>,
}

impl RawRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::OrderDate => &self.order_date,
            Field::Region => &self.region,
            Field::Category => &self.category,
            Field::CustomerId => &self.customer_id,
            Field::SalesAmount => &self.sales_amount,
            Field::Profit => &self.profit,
            Field::Quantity => &self.quantity,
            Field::Discount => &self.discount,
            Field::ShippingCost => &self.shipping_cost,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::OrderDate => &mut self.order_date,
            Field::Region => &mut self.region,
            Field::Category => &mut self.category,
            Field::CustomerId => &mut self.customer_id,
            Field::SalesAmount => &mut self.sales_amount,
            Field::Profit => &mut self.profit,
            Field::Quantity => &mut self.quantity,
            Field::Discount => &mut self.discount,
            Field::ShippingCost => &mut self.shipping_cost,
        }
    }
}

/// The loaded, not yet cleaned, transaction table
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub source: PathBuf,
    pub records: Vec<RawRecord>,
    pub has_discount: bool,
    pub has_shipping_cost: bool,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load the transaction CSV at `path`.
///
/// Every column is read as text; parsing and validation of the values is the
/// cleaner's job. Fails with `DataLoad` when the file is missing, empty,
/// unparseable, has no data rows, or lacks any required column.
pub fn load_transactions(path: impl AsRef<Path>) -> Result<RawTable, AnalyticsError> {
    let path = path.as_ref();

    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnalyticsError::load(path, "file not found")
        } else {
            AnalyticsError::load(path, format!("file is not readable: {}", e))
        }
    })?;
    if !metadata.is_file() {
        return Err(AnalyticsError::load(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(AnalyticsError::load(path, "file is empty"));
    }

    info!("Loading transactions from {}", path.display());

    // Lossy UTF-8 keeps latin-1 exports readable; no schema inference so every
    // column arrives as a string column.
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_encoding(CsvEncoding::LossyUtf8))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| AnalyticsError::load(path, format!("unreadable CSV: {}", e)))?;

    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    debug!("Columns found: {:?}", headers);

    let required = resolve_columns(&headers, &Field::REQUIRED);
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, header)| header.is_none())
        .map(|(field, _)| field.name())
        .collect();
    if !missing.is_empty() {
        return Err(AnalyticsError::load(
            path,
            format!("missing required column(s): {}", missing.join(", ")),
        ));
    }

    if df.height() == 0 {
        return Err(AnalyticsError::load(path, "no data rows"));
    }

    let optional = resolve_columns(&headers, &Field::OPTIONAL);
    let mut records = vec![RawRecord::default(); df.height()];

    for (field, header) in required.iter().chain(optional.iter()) {
        let Some(header) = header else { continue };
        let column = df
            .column(header)
            .and_then(|c| c.as_materialized_series().str())
            .map_err(|e| AnalyticsError::load(path, format!("column '{}': {}", header, e)))?;
        for (record, cell) in records.iter_mut().zip(column) {
            *record.slot_mut(*field) = cell.map(str::to_owned);
        }
    }

    let has_column = |field: Field| {
        optional
            .iter()
            .any(|(f, header)| *f == field && header.is_some())
    };

    info!("Loaded {} rows", records.len());

    Ok(RawTable {
        source: path.to_path_buf(),
        has_discount: has_column(Field::Discount),
        has_shipping_cost: has_column(Field::ShippingCost),
        records,
    })
}

/// Map each field to the first header that names it
fn resolve_columns(headers: &[String], fields: &[Field]) -> Vec<(Field, Option<String>)> {
    fields
        .iter()
        .map(|&field| {
            let header = headers.iter().find(|h| field.matches(h)).cloned();
            (field, header)
        })
        .collect()
}
