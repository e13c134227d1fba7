//! Data access port traits.

use crate::domain::error::LittermanError;
use crate::domain::price_table::PriceTable;
use crate::domain::universe::MarketComposition;
use chrono::NaiveDate;

/// Source of historical prices.
pub trait DataPort {
    /// Prices inside the inclusive date range; `None` leaves that end open.
    fn fetch_prices(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<PriceTable, LittermanError>;

    fn list_assets(&self) -> Result<Vec<String>, LittermanError>;

    fn get_data_range(&self) -> Result<Option<(NaiveDate, NaiveDate, usize)>, LittermanError>;
}

/// Source of portfolio holdings.
pub trait HoldingsPort {
    fn fetch_composition(&self) -> Result<MarketComposition, LittermanError>;
}
