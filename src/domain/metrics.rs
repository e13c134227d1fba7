//! Holdings analytics for a share-count portfolio.
//!
//! Values the holdings on every date where all tickers are priced, then
//! summarizes the resulting value series: cumulative return, historical VaR,
//! volatility, max drawdown and the cross-asset return correlation.

use crate::domain::error::LittermanError;
use crate::domain::estimator::{compute_returns, sample_covariance, ReturnMethod};
use crate::domain::price_table::PriceTable;
use crate::domain::universe::AssetUniverse;
use chrono::NaiveDate;
use nalgebra::DMatrix;

pub const DEFAULT_VAR_LEVELS: [f64; 3] = [0.01, 0.05, 0.10];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub assets: Vec<String>,
    pub values: Vec<ValuePoint>,
    pub returns: Vec<f64>,
    pub last_value: f64,
    pub last_return: f64,
    pub cumulative_return: f64,
    /// (level, return quantile) pairs.
    pub value_at_risk: Vec<(f64, f64)>,
    pub volatility: f64,
    /// Most negative fractional distance below the running peak.
    pub max_drawdown: f64,
    pub correlation: DMatrix<f64>,
}

impl PortfolioSummary {
    pub fn compute(prices: &PriceTable, shares: &[(String, f64)]) -> Result<Self, LittermanError> {
        let universe = AssetUniverse::new(shares.iter().map(|(a, _)| a.clone()).collect())?;
        prices.require_columns(&universe)?;

        let rows: Vec<(NaiveDate, Option<f64>)> = prices
            .aligned_rows(&universe)?
            .into_iter()
            .map(|(date, row)| {
                let value = row.map(|p| p.iter().zip(shares).map(|(price, (_, n))| price * n).sum::<f64>());
                (date, value)
            })
            .collect();
        let values: Vec<ValuePoint> = rows
            .iter()
            .filter_map(|&(date, value)| value.map(|value| ValuePoint { date, value }))
            .collect();

        // Same rule as asset returns: both adjacent rows must be fully priced.
        let mut returns = Vec::new();
        for pair in rows.windows(2) {
            match (pair[0].1, pair[1].1) {
                (Some(v0), Some(v1)) => {
                    if v0 == 0.0 {
                        return Err(LittermanError::degenerate(format!(
                            "portfolio value is zero on {}",
                            pair[0].0
                        )));
                    }
                    returns.push(v1 / v0 - 1.0);
                }
                _ => tracing::debug!(date = %pair[1].0, "skipping portfolio return with incomplete prices"),
            }
        }
        if returns.len() < 2 {
            return Err(LittermanError::degenerate(format!(
                "need at least 2 portfolio returns, have {}",
                returns.len()
            )));
        }

        let first = values[0].value;
        let last = values[values.len() - 1].value;
        if first == 0.0 {
            return Err(LittermanError::degenerate("portfolio starts at zero value"));
        }
        let cumulative_return = last / first - 1.0;

        let value_at_risk = DEFAULT_VAR_LEVELS
            .iter()
            .map(|&level| (level, percentile(&returns, level)))
            .collect();

        let asset_returns = compute_returns(prices, &universe, ReturnMethod::Simple)?;
        let correlation = correlation(&sample_covariance(&asset_returns)?);

        Ok(Self {
            assets: universe.as_slice().to_vec(),
            last_value: last,
            last_return: returns[returns.len() - 1],
            cumulative_return,
            value_at_risk,
            volatility: sample_std(&returns),
            max_drawdown: max_drawdown(&values),
            correlation,
            returns,
            values,
        })
    }
}

/// Linear-interpolated quantile, `q` in [0, 1].
pub fn percentile(data: &[f64], q: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    (data.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

pub fn max_drawdown(values: &[ValuePoint]) -> f64 {
    let Some(first) = values.first() else {
        return 0.0;
    };
    let mut peak = first.value;
    let mut max_dd = 0.0_f64;
    for point in values {
        if point.value > peak {
            peak = point.value;
        } else if peak > 0.0 {
            let dd = (point.value - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

pub fn correlation(cov: &DMatrix<f64>) -> DMatrix<f64> {
    let sd: Vec<f64> = cov.diagonal().iter().map(|v| v.sqrt()).collect();
    DMatrix::from_fn(cov.nrows(), cov.ncols(), |i, j| {
        if sd[i] > 0.0 && sd[j] > 0.0 {
            cov[(i, j)] / (sd[i] * sd[j])
        } else if i == j {
            1.0
        } else {
            0.0
        }
    })
}

/// Rescales a series so that its first value is 100.
pub fn normalize_base100(values: &[f64]) -> Vec<f64> {
    match values.first() {
        Some(&first) if first != 0.0 => values.iter().map(|v| v / first * 100.0).collect(),
        _ => values.to_vec(),
    }
}
