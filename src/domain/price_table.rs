//! Date-ordered price table with one column per asset.

use crate::domain::error::LittermanError;
use crate::domain::universe::AssetUniverse;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// One row of prices projected onto a universe. `None` when any universe
/// asset has no price on that date.
pub type AlignedRow = (NaiveDate, Option<Vec<f64>>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a price. Prices must be finite and strictly positive.
    pub fn insert(&mut self, date: NaiveDate, asset: &str, price: f64) -> Result<(), LittermanError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(LittermanError::degenerate(format!(
                "price for {asset} on {date} must be strictly positive, got {price}"
            )));
        }
        if !self.columns.iter().any(|c| c == asset) {
            self.columns.push(asset.to_string());
        }
        self.rows
            .entry(date)
            .or_default()
            .insert(asset.to_string(), price);
        Ok(())
    }

    /// Registers a column that may have no prices yet.
    pub fn add_column(&mut self, asset: &str) {
        if !self.has_column(asset) {
            self.columns.push(asset.to_string());
        }
    }

    pub fn with_price(mut self, date: NaiveDate, asset: &str, price: f64) -> Result<Self, LittermanError> {
        self.insert(date, asset, price)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, asset: &str) -> bool {
        self.columns.iter().any(|c| c == asset)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn price(&self, date: NaiveDate, asset: &str) -> Option<f64> {
        self.rows.get(&date).and_then(|row| row.get(asset)).copied()
    }

    /// Keeps rows whose date falls inside the inclusive range.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|(date, _)| start.is_none_or(|s| **date >= s) && end.is_none_or(|e| **date <= e))
            .map(|(date, row)| (*date, row.clone()))
            .collect();
        Self {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Fails with `InputMismatch` naming every universe asset that has no
    /// column in the table.
    pub fn require_columns(&self, universe: &AssetUniverse) -> Result<(), LittermanError> {
        let missing: Vec<&str> = universe.iter().filter(|a| !self.has_column(a)).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LittermanError::InputMismatch {
                reason: format!("assets missing from price data: {}", missing.join(", ")),
            })
        }
    }

    /// Projects every row onto the universe order.
    pub fn aligned_rows(&self, universe: &AssetUniverse) -> Result<Vec<AlignedRow>, LittermanError> {
        self.require_columns(universe)?;
        Ok(self
            .rows
            .iter()
            .map(|(date, row)| {
                let prices: Option<Vec<f64>> = universe.iter().map(|a| row.get(a).copied()).collect();
                (*date, prices)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn universe(assets: &[&str]) -> AssetUniverse {
        AssetUniverse::new(assets.iter().map(|a| a.to_string()).collect()).unwrap()
    }

    #[test]
    fn rows_are_sorted_by_date() {
        let table = PriceTable::new()
            .with_price(d(3), "A", 102.0)
            .unwrap()
            .with_price(d(1), "A", 100.0)
            .unwrap()
            .with_price(d(2), "A", 101.0)
            .unwrap();
        let dates: Vec<_> = table.dates().collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut table = PriceTable::new();
        assert!(matches!(
            table.insert(d(1), "A", 0.0),
            Err(LittermanError::DegenerateData { .. })
        ));
        assert!(table.insert(d(1), "A", -3.0).is_err());
        assert!(table.insert(d(1), "A", f64::NAN).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn require_columns_reports_missing_assets() {
        let table = PriceTable::new().with_price(d(1), "A", 1.0).unwrap();
        let err = table.require_columns(&universe(&["A", "B", "C"])).unwrap_err();
        assert!(matches!(err, LittermanError::InputMismatch { reason } if reason.contains("B, C")));
    }

    #[test]
    fn aligned_rows_follow_universe_order_and_flag_gaps() {
        let table = PriceTable::new()
            .with_price(d(1), "A", 1.0)
            .unwrap()
            .with_price(d(1), "B", 2.0)
            .unwrap()
            .with_price(d(2), "A", 1.5)
            .unwrap();
        let rows = table.aligned_rows(&universe(&["B", "A"])).unwrap();
        assert_eq!(rows[0], (d(1), Some(vec![2.0, 1.0])));
        assert_eq!(rows[1], (d(2), None));
    }

    #[test]
    fn between_filters_inclusively() {
        let mut table = PriceTable::new();
        for day in 1..=5 {
            table.insert(d(day), "A", 100.0 + day as f64).unwrap();
        }
        let filtered = table.between(Some(d(2)), Some(d(4)));
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered.price(d(2), "A"), Some(102.0));
        assert_eq!(table.between(None, None).len(), 5);
    }
}
