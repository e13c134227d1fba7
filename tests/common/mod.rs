#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use litterman::domain::error::LittermanError;
use litterman::domain::model::Allocation;
use litterman::domain::price_table::PriceTable;
use litterman::domain::universe::MarketComposition;
use litterman::ports::data_port::{DataPort, HoldingsPort};
use litterman::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub struct MockDataPort {
    pub prices: PriceTable,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            prices: PriceTable::new(),
            error: None,
        }
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), LittermanError> {
        match &self.error {
            Some(reason) => Err(LittermanError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceTable, LittermanError> {
        self.check()?;
        Ok(self.prices.between(start_date, end_date))
    }

    fn list_assets(&self) -> Result<Vec<String>, LittermanError> {
        self.check()?;
        Ok(self.prices.columns().to_vec())
    }

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LittermanError> {
        self.check()?;
        let dates: Vec<NaiveDate> = self.prices.dates().collect();
        match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => Ok(Some((*first, *last, dates.len()))),
            _ => Ok(None),
        }
    }
}

pub struct MockHoldingsPort {
    pub entries: Vec<(String, f64)>,
}

impl MockHoldingsPort {
    pub fn new(pairs: &[(&str, f64)]) -> Self {
        Self {
            entries: pairs.iter().map(|(a, w)| (a.to_string(), *w)).collect(),
        }
    }
}

impl HoldingsPort for MockHoldingsPort {
    fn fetch_composition(&self) -> Result<MarketComposition, LittermanError> {
        MarketComposition::new(self.entries.clone())
    }
}

pub struct MockReportPort {
    pub calls: RefCell<Vec<(Allocation, PathBuf)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockReportPort {
    fn write(&self, allocation: &Allocation, output_path: &Path) -> Result<(), LittermanError> {
        self.calls
            .borrow_mut()
            .push((allocation.clone(), output_path.to_path_buf()));
        Ok(())
    }
}

pub fn date(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
}

pub fn composition(pairs: &[(&str, f64)]) -> MarketComposition {
    MarketComposition::new(pairs.iter().map(|(a, w)| (a.to_string(), *w)).collect()).unwrap()
}

/// Deterministic, non-collinear daily prices for `assets`, `rows` dates
/// starting 2024-01-01.
pub fn sample_prices(assets: &[&str], rows: usize) -> PriceTable {
    let mut table = PriceTable::new();
    for (j, asset) in assets.iter().enumerate() {
        let mut price = 100.0 * (j as f64 + 1.0);
        for t in 0..rows {
            if t > 0 {
                let phase = 0.7 * t as f64 * (j as f64 + 1.0) + j as f64;
                price *= 1.0 + 0.01 * phase.sin() + 0.0005 * (j as f64 + 1.0);
            }
            table.insert(date(t as u64), asset, price).unwrap();
        }
    }
    table
}

/// Writes `sample_prices` as a wide CSV file.
pub fn write_prices_csv(path: &Path, assets: &[&str], rows: usize) {
    let table = sample_prices(assets, rows);
    let mut out = format!("date,{}\n", assets.join(","));
    for d in table.dates() {
        let cells: Vec<String> = assets
            .iter()
            .map(|a| table.price(d, a).unwrap().to_string())
            .collect();
        out.push_str(&format!("{},{}\n", d.format("%Y-%m-%d"), cells.join(",")));
    }
    std::fs::write(path, out).unwrap();
}

pub fn write_composition_csv(path: &Path, pairs: &[(&str, f64)]) {
    let mut out = String::from("asset,weight\n");
    for (asset, weight) in pairs {
        out.push_str(&format!("{asset},{weight}\n"));
    }
    std::fs::write(path, out).unwrap();
}
