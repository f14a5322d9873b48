//! Typed transaction records and the fixed label sets they are validated against

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// One cleaned row of the sales dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub order_date: NaiveDate,
    pub region: Region,
    pub category: Category,
    pub customer_id: String,
    pub sales_amount: Decimal,
    pub profit: Decimal,
    pub quantity: u32,
    pub discount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
}

impl Transaction {
    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.order_date)
    }
}

/// What to do with a region or category label outside the known set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownLabelPolicy {
    /// Fail the run, naming the value
    Reject,
    /// Bucket the row under `Other`
    #[default]
    Other,
}

/// Lowercase and strip everything but letters and digits
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Sales regions of the Global Superstore dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Region {
    Africa,
    Canada,
    Caribbean,
    Central,
    CentralAsia,
    East,
    Emea,
    North,
    NorthAsia,
    Oceania,
    South,
    SoutheastAsia,
    West,
    Other,
}

impl Region {
    pub const KNOWN: [Region; 13] = [
        Region::Africa,
        Region::Canada,
        Region::Caribbean,
        Region::Central,
        Region::CentralAsia,
        Region::East,
        Region::Emea,
        Region::North,
        Region::NorthAsia,
        Region::Oceania,
        Region::South,
        Region::SoutheastAsia,
        Region::West,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::Africa => "Africa",
            Region::Canada => "Canada",
            Region::Caribbean => "Caribbean",
            Region::Central => "Central",
            Region::CentralAsia => "Central Asia",
            Region::East => "East",
            Region::Emea => "EMEA",
            Region::North => "North",
            Region::NorthAsia => "North Asia",
            Region::Oceania => "Oceania",
            Region::South => "South",
            Region::SoutheastAsia => "Southeast Asia",
            Region::West => "West",
            Region::Other => "Other",
        }
    }

    /// Match a raw label against the known regions, ignoring case and spacing
    pub fn from_label(label: &str) -> Option<Region> {
        let wanted = normalize_label(label);
        Region::KNOWN
            .into_iter()
            .find(|region| normalize_label(region.name()) == wanted)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Product categories of the Global Superstore dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Furniture,
    OfficeSupplies,
    Technology,
    Other,
}

impl Category {
    pub const KNOWN: [Category; 3] = [
        Category::Furniture,
        Category::OfficeSupplies,
        Category::Technology,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Furniture => "Furniture",
            Category::OfficeSupplies => "Office Supplies",
            Category::Technology => "Technology",
            Category::Other => "Other",
        }
    }

    pub fn from_label(label: &str) -> Option<Category> {
        let wanted = normalize_label(label);
        Category::KNOWN
            .into_iter()
            .find(|category| normalize_label(category.name()) == wanted)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calendar month used as the key of the revenue trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_labels_match_loosely() {
        assert_eq!(Region::from_label("Southeast Asia"), Some(Region::SoutheastAsia));
        assert_eq!(Region::from_label("  southeast-asia "), Some(Region::SoutheastAsia));
        assert_eq!(Region::from_label("emea"), Some(Region::Emea));
        assert_eq!(Region::from_label("Atlantis"), None);
    }

    #[test]
    fn test_category_labels_match_loosely() {
        assert_eq!(
            Category::from_label("office supplies"),
            Some(Category::OfficeSupplies)
        );
        assert_eq!(Category::from_label("Office_Supplies"), Some(Category::OfficeSupplies));
        assert_eq!(Category::from_label("Toys"), None);
    }

    #[test]
    fn test_year_month_rolls_over() {
        assert_eq!(YearMonth::new(2013, 12).next(), YearMonth::new(2014, 1));
        assert_eq!(YearMonth::new(2014, 3).next(), YearMonth::new(2014, 4));
        assert_eq!(YearMonth::new(2014, 3).to_string(), "2014-03");
        assert!(YearMonth::new(2013, 12) < YearMonth::new(2014, 1));
    }
}
