//! Black–Litterman master formula.
//!
//! mu = pi + tau.Sigma.P' (P.tau.Sigma.P' + Omega)^-1 (Q - P.pi)
//!
//! The inverted matrix is views x views.

use crate::domain::error::LittermanError;
use crate::domain::view_set::ViewSet;
use nalgebra::{Cholesky, DMatrix, DVector};

pub const DEFAULT_TAU: f64 = 0.025;

/// Smallest accepted ratio of the extreme eigenvalues of the inner matrix.
pub const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

pub fn posterior_returns(
    pi: &DVector<f64>,
    sigma: &DMatrix<f64>,
    tau: f64,
    views: &ViewSet,
) -> Result<DVector<f64>, LittermanError> {
    let m = match views {
        ViewSet::Empty => return Ok(pi.clone()),
        ViewSet::Views(m) => m,
    };
    if !tau.is_finite() || tau <= 0.0 {
        return Err(LittermanError::invalid_parameter(
            "tau",
            format!("must be strictly positive, got {tau}"),
        ));
    }
    if m.p.ncols() != pi.len() || sigma.shape() != (pi.len(), pi.len()) {
        return Err(LittermanError::InputMismatch {
            reason: format!(
                "view matrix has {} columns, covariance is {}x{}, pi has {} entries",
                m.p.ncols(),
                sigma.nrows(),
                sigma.ncols(),
                pi.len()
            ),
        });
    }

    let scaled_sigma_pt = sigma * m.p.transpose() * tau;
    let inner = &m.p * &scaled_sigma_pt + &m.omega;
    check_conditioning(&inner)?;

    let chol = Cholesky::new(inner).ok_or_else(|| {
        LittermanError::degenerate("view uncertainty matrix is not positive definite")
    })?;
    let surprise = &m.q - &m.p * pi;
    let adjustment = scaled_sigma_pt * chol.solve(&surprise);
    Ok(pi + adjustment)
}

fn check_conditioning(inner: &DMatrix<f64>) -> Result<(), LittermanError> {
    let eigenvalues = inner.clone().symmetric_eigen().eigenvalues;
    let max = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if !(max.is_finite() && min.is_finite()) || max <= 0.0 {
        return Err(LittermanError::degenerate(
            "view uncertainty matrix has non-finite or non-positive spectrum",
        ));
    }
    let rcond = min / max;
    if rcond < MIN_RECIPROCAL_CONDITION {
        return Err(LittermanError::degenerate(format!(
            "view uncertainty matrix is ill-conditioned (reciprocal condition {rcond:e})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::view_set::ViewMatrices;
    use approx::assert_relative_eq;

    fn sigma() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09])
    }

    fn pi() -> DVector<f64> {
        &sigma() * DVector::from_vec(vec![0.6, 0.4]) * 3.0
    }

    fn single_view(row: [f64; 2], q: f64, omega: f64) -> ViewSet {
        ViewSet::Views(ViewMatrices {
            p: DMatrix::from_row_slice(1, 2, &row),
            q: DVector::from_vec(vec![q]),
            omega: DMatrix::from_element(1, 1, omega),
        })
    }

    #[test]
    fn empty_views_return_pi_exactly() {
        let pi = pi();
        let post = posterior_returns(&pi, &sigma(), DEFAULT_TAU, &ViewSet::Empty).unwrap();
        assert_eq!(post, pi);
    }

    #[test]
    fn view_at_equilibrium_changes_nothing() {
        let pi = pi();
        let views = single_view([1.0, 0.0], pi[0], 1e-4);
        let post = posterior_returns(&pi, &sigma(), DEFAULT_TAU, &views).unwrap();
        assert_relative_eq!(post[0], pi[0], epsilon = 1e-15);
        assert_relative_eq!(post[1], pi[1], epsilon = 1e-15);
    }

    #[test]
    fn single_view_matches_closed_form() {
        let pi = pi();
        let tau = DEFAULT_TAU;
        let omega = 1e-4;
        let excess = 0.02;
        let views = single_view([1.0, 0.0], pi[0] + excess, omega);
        let post = posterior_returns(&pi, &sigma(), tau, &views).unwrap();

        // With P = e1: mu = pi + tau*Sigma[:,0] * excess / (tau*Sigma[0,0] + omega)
        let denom = tau * 0.04 + omega;
        assert_relative_eq!(post[0], pi[0] + tau * 0.04 * excess / denom, epsilon = 1e-14);
        assert_relative_eq!(post[1], pi[1] + tau * 0.01 * excess / denom, epsilon = 1e-14);
    }

    #[test]
    fn bullish_view_raises_return() {
        let pi = pi();
        let views = single_view([0.0, 1.0], pi[1] + 0.05, 1e-3);
        let post = posterior_returns(&pi, &sigma(), DEFAULT_TAU, &views).unwrap();
        assert!(post[1] > pi[1]);
    }

    #[test]
    fn duplicated_views_with_tiny_uncertainty_are_degenerate() {
        let pi = pi();
        let views = ViewSet::Views(ViewMatrices {
            p: DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]),
            q: DVector::from_vec(vec![0.1, 0.1]),
            omega: DMatrix::from_diagonal(&DVector::from_vec(vec![1e-300, 1e-300])),
        });
        let err = posterior_returns(&pi, &sigma(), DEFAULT_TAU, &views).unwrap_err();
        assert!(matches!(err, LittermanError::DegenerateData { .. }));
    }

    #[test]
    fn rejects_non_positive_tau() {
        let pi = pi();
        let views = single_view([1.0, 0.0], 0.1, 1e-4);
        assert!(posterior_returns(&pi, &sigma(), 0.0, &views).is_err());
    }
}
