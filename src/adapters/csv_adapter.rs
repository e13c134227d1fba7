//! CSV file data adapters.
//!
//! Prices are read from a wide file, `date,<asset>,<asset>,...`, where an
//! empty cell means no price on that date. Holdings files are two columns,
//! `asset,weight` or `asset,shares`.

use crate::domain::error::LittermanError;
use crate::domain::price_table::PriceTable;
use crate::domain::universe::MarketComposition;
use crate::ports::data_port::{DataPort, HoldingsPort};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_table(&self) -> Result<PriceTable, LittermanError> {
        let content = read_file(&self.path)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| data_err(format!("CSV header error: {e}")))?
            .clone();
        if headers.len() < 2 {
            return Err(data_err(format!(
                "{} has no asset columns",
                self.path.display()
            )));
        }
        let assets: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

        let mut table = PriceTable::new();
        for asset in &assets {
            table.add_column(asset);
        }

        for result in rdr.records() {
            let record = result.map_err(|e| data_err(format!("CSV parse error: {e}")))?;
            let date_str = record
                .get(0)
                .ok_or_else(|| data_err("missing date column"))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| data_err(format!("invalid date '{date_str}': {e}")))?;

            for (asset, cell) in assets.iter().zip(record.iter().skip(1)) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                let price: f64 = cell
                    .parse()
                    .map_err(|e| data_err(format!("invalid price for {asset} on {date}: {e}")))?;
                table.insert(date, asset, price)?;
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            rows = table.len(),
            assets = assets.len(),
            "loaded price table"
        );
        Ok(table)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceTable, LittermanError> {
        let table = self.read_table()?;
        if start_date.is_none() && end_date.is_none() {
            return Ok(table);
        }
        Ok(table.between(start_date, end_date))
    }

    fn list_assets(&self) -> Result<Vec<String>, LittermanError> {
        let content = read_file(&self.path)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| data_err(format!("CSV header error: {e}")))?;
        Ok(headers
            .iter()
            .skip(1)
            .map(|h| h.trim().to_string())
            .collect())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LittermanError> {
        let table = self.read_table()?;
        let mut dates = table.dates();
        let Some(first) = dates.next() else {
            return Ok(None);
        };
        let last = dates.last().unwrap_or(first);
        Ok(Some((first, last, table.len())))
    }
}

/// Market composition from an `asset,weight` file.
pub struct CsvHoldingsAdapter {
    path: PathBuf,
}

impl CsvHoldingsAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HoldingsPort for CsvHoldingsAdapter {
    fn fetch_composition(&self) -> Result<MarketComposition, LittermanError> {
        MarketComposition::new(read_pairs(&self.path)?)
    }
}

/// Share counts from an `asset,shares` file, in file order.
pub fn read_shares(path: &Path) -> Result<Vec<(String, f64)>, LittermanError> {
    let shares = read_pairs(path)?;
    if let Some((asset, n)) = shares.iter().find(|(_, n)| !n.is_finite() || *n < 0.0) {
        return Err(data_err(format!(
            "share count for {asset} must be non-negative, got {n}"
        )));
    }
    Ok(shares)
}

fn read_pairs(path: &Path) -> Result<Vec<(String, f64)>, LittermanError> {
    let content = read_file(path)?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut pairs = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| data_err(format!("CSV parse error: {e}")))?;
        let asset = record
            .get(0)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| data_err("missing asset column"))?;
        let value: f64 = record
            .get(1)
            .ok_or_else(|| data_err(format!("missing value for {asset}")))?
            .trim()
            .parse()
            .map_err(|e| data_err(format!("invalid value for {asset}: {e}")))?;
        pairs.push((asset.to_string(), value));
    }

    Ok(pairs)
}

fn read_file(path: &Path) -> Result<String, LittermanError> {
    fs::read_to_string(path).map_err(|e| data_err(format!("failed to read {}: {e}", path.display())))
}

fn data_err(reason: impl Into<String>) -> LittermanError {
    LittermanError::Data {
        reason: reason.into(),
    }
}
