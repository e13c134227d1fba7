//! Return and covariance estimation from a price table.
//!
//! log:    r[t] = ln(P[t] / P[t-1])
//! simple: r[t] = P[t] / P[t-1] - 1
//!
//! A return row exists only when both the row and its predecessor carry a
//! price for every universe asset; the first row never has one.

use crate::domain::error::LittermanError;
use crate::domain::price_table::PriceTable;
use crate::domain::universe::AssetUniverse;
use chrono::NaiveDate;
use nalgebra::DMatrix;
use std::fmt;
use std::str::FromStr;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMethod {
    #[default]
    Log,
    Simple,
}

impl FromStr for ReturnMethod {
    type Err = LittermanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(ReturnMethod::Log),
            "simple" => Ok(ReturnMethod::Simple),
            other => Err(LittermanError::invalid_parameter(
                "return_method",
                format!("expected 'log' or 'simple', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for ReturnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnMethod::Log => write!(f, "log"),
            ReturnMethod::Simple => write!(f, "simple"),
        }
    }
}

/// Per-period returns, one row per date and one column per universe asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    pub dates: Vec<NaiveDate>,
    pub values: DMatrix<f64>,
}

impl ReturnMatrix {
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }
}

pub fn compute_returns(
    prices: &PriceTable,
    universe: &AssetUniverse,
    method: ReturnMethod,
) -> Result<ReturnMatrix, LittermanError> {
    let rows = prices.aligned_rows(universe)?;
    let n = universe.len();
    let mut dates = Vec::new();
    let mut data = Vec::new();

    for pair in rows.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        match (&prev.1, &curr.1) {
            (Some(p0), Some(p1)) => {
                dates.push(curr.0);
                data.extend(p0.iter().zip(p1).map(|(a, b)| match method {
                    ReturnMethod::Log => (b / a).ln(),
                    ReturnMethod::Simple => b / a - 1.0,
                }));
            }
            _ => tracing::debug!(date = %curr.0, "skipping return row with incomplete prices"),
        }
    }

    Ok(ReturnMatrix {
        values: DMatrix::from_row_slice(dates.len(), n, &data),
        dates,
    })
}

/// Sample covariance (denominator n - 1) of the return columns.
pub fn sample_covariance(returns: &ReturnMatrix) -> Result<DMatrix<f64>, LittermanError> {
    let t = returns.rows();
    if t < 2 {
        return Err(LittermanError::degenerate(format!(
            "need at least 2 aligned return rows, have {t}"
        )));
    }
    let means = returns.values.row_mean();
    let mut centered = returns.values.clone();
    for mut row in centered.row_iter_mut() {
        row -= &means;
    }
    let cov = centered.transpose() * &centered / (t as f64 - 1.0);
    // Symmetrize to drop rounding asymmetry from the product.
    Ok((&cov + cov.transpose()) * 0.5)
}

pub fn annualize(cov: DMatrix<f64>) -> DMatrix<f64> {
    cov * TRADING_DAYS_PER_YEAR
}

pub fn estimate(
    prices: &PriceTable,
    universe: &AssetUniverse,
    method: ReturnMethod,
    annualized: bool,
) -> Result<(ReturnMatrix, DMatrix<f64>), LittermanError> {
    let returns = compute_returns(prices, universe, method)?;
    let cov = sample_covariance(&returns)?;
    let cov = if annualized { annualize(cov) } else { cov };
    tracing::debug!(
        rows = returns.rows(),
        assets = universe.len(),
        %method,
        annualized,
        "estimated covariance"
    );
    Ok((returns, cov))
}
