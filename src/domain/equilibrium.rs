//! Reverse optimization: pi = lambda * Sigma * w_market.

use crate::domain::error::LittermanError;
use nalgebra::{DMatrix, DVector};

pub fn equilibrium_returns(
    sigma: &DMatrix<f64>,
    w_market: &DVector<f64>,
    risk_aversion: f64,
) -> Result<DVector<f64>, LittermanError> {
    if sigma.nrows() != sigma.ncols() || sigma.ncols() != w_market.len() {
        return Err(LittermanError::InputMismatch {
            reason: format!(
                "covariance is {}x{} but market weights have {} entries",
                sigma.nrows(),
                sigma.ncols(),
                w_market.len()
            ),
        });
    }
    Ok(sigma * w_market * risk_aversion)
}
