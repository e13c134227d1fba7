//! Bounded mean-variance optimizer.
//!
//! maximize   mu'w - (lambda/2) w'Sigma w
//! subject to sum(w) = 1
//!            (1 - d) w_mkt[i] <= w[i] <= (1 + d) w_mkt[i]
//!
//! Solved as the equivalent convex minimization with a primal active-set
//! method. Each iteration fixes the variables in the working set at their
//! bounds and minimizes over the remaining free variables on the budget
//! plane. The reduced Hessian may be singular (short price histories give a
//! rank-deficient Sigma); along its null space the objective is linear and
//! the solver walks to the next bound instead.

use crate::domain::error::LittermanError;
use nalgebra::{DMatrix, DVector};

pub const DEFAULT_MAX_DEVIATION: f64 = 0.20;

/// Rounding slack for the bound-sum feasibility precheck.
const FEASIBILITY_SLACK: f64 = 1e-12;

/// Step components smaller than this never block a step.
const BLOCKING_EPS: f64 = 1e-15;

/// Reduced-Hessian eigenvalues below this fraction of the largest one are
/// treated as zero curvature.
const NULL_SPACE_RATIO: f64 = 1e-10;

/// Minimum size, relative to the gradient, of a zero-curvature descent
/// direction before it is followed.
const FLAT_DIRECTION_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Bounds {
    /// Per-asset box anchored to the market weight.
    pub fn around_market(w_market: &DVector<f64>, max_deviation: f64) -> Result<Self, LittermanError> {
        if !max_deviation.is_finite() || !(0.0..1.0).contains(&max_deviation) {
            return Err(LittermanError::invalid_parameter(
                "max_deviation",
                format!("must lie in [0, 1), got {max_deviation}"),
            ));
        }
        Ok(Self {
            lower: w_market * (1.0 - max_deviation),
            upper: w_market * (1.0 + max_deviation),
        })
    }

    /// Fails fast when no weight vector inside the box can sum to 1.
    pub fn check_feasible(&self) -> Result<(), LittermanError> {
        let lower_sum = self.lower.sum();
        let upper_sum = self.upper.sum();
        if lower_sum > 1.0 + FEASIBILITY_SLACK {
            return Err(LittermanError::InfeasibleConstraints {
                reason: format!(
                    "lower bounds sum to {lower_sum:.6} > 1; reduce max_deviation or normalize the market weights"
                ),
            });
        }
        if upper_sum < 1.0 - FEASIBILITY_SLACK {
            return Err(LittermanError::InfeasibleConstraints {
                reason: format!(
                    "upper bounds sum to {upper_sum:.6} < 1; increase max_deviation or normalize the market weights"
                ),
            });
        }
        Ok(())
    }

    fn is_pinned(&self, i: usize) -> bool {
        self.upper[i] - self.lower[i] <= BLOCKING_EPS
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub weights: DVector<f64>,
    /// Mean-variance utility at the solution.
    pub utility: f64,
    pub iterations: usize,
}

/// Search direction over the free variables, the budget multiplier, and the
/// longest step worth taking along the direction.
struct Step {
    direction: DVector<f64>,
    nu: f64,
    max_alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Lower,
    Upper,
}

pub fn optimize(
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
    risk_aversion: f64,
    w_market: &DVector<f64>,
    max_deviation: f64,
    config: &OptimizerConfig,
) -> Result<Solution, LittermanError> {
    let n = w_market.len();
    if mu.len() != n || sigma.shape() != (n, n) {
        return Err(LittermanError::InputMismatch {
            reason: format!(
                "expected {n} returns and a {n}x{n} covariance, got {} and {}x{}",
                mu.len(),
                sigma.nrows(),
                sigma.ncols()
            ),
        });
    }
    if !risk_aversion.is_finite() || risk_aversion <= 0.0 {
        return Err(LittermanError::invalid_parameter(
            "risk_aversion",
            format!("must be strictly positive, got {risk_aversion}"),
        ));
    }
    if mu.iter().any(|v| !v.is_finite()) {
        return Err(LittermanError::degenerate("expected returns contain non-finite values"));
    }

    let bounds = Bounds::around_market(w_market, max_deviation)?;
    bounds.check_feasible()?;

    let mut solver = ActiveSetSolver::new(mu, sigma * risk_aversion, bounds, config);
    solver.warm_start(w_market);
    let (weights, iterations) = solver.run()?;
    let utility = mu.dot(&weights) - 0.5 * risk_aversion * (sigma * &weights).dot(&weights);
    tracing::debug!(iterations, utility, "mean-variance optimization converged");

    Ok(Solution {
        weights,
        utility,
        iterations,
    })
}

struct ActiveSetSolver<'a> {
    mu: &'a DVector<f64>,
    hessian: DMatrix<f64>,
    bounds: Bounds,
    config: &'a OptimizerConfig,
    w: DVector<f64>,
    working: Vec<Option<Active>>,
    /// Set when the last step had zero length; releases then follow
    /// smallest-index order so degenerate vertices cannot cycle.
    degenerate: bool,
}

impl<'a> ActiveSetSolver<'a> {
    fn new(mu: &'a DVector<f64>, hessian: DMatrix<f64>, bounds: Bounds, config: &'a OptimizerConfig) -> Self {
        let n = mu.len();
        Self {
            mu,
            hessian,
            bounds,
            config,
            w: DVector::zeros(n),
            working: vec![None; n],
            degenerate: false,
        }
    }

    /// Starts from the market weights, shifted along the box slack when they
    /// do not already sum to 1.
    fn warm_start(&mut self, w_market: &DVector<f64>) {
        let n = self.w.len();
        let mut w = DVector::from_fn(n, |i, _| {
            w_market[i].clamp(self.bounds.lower[i], self.bounds.upper[i])
        });
        let residual = 1.0 - w.sum();
        let slack = if residual > 0.0 {
            &self.bounds.upper - &w
        } else {
            &w - &self.bounds.lower
        };
        let slack_sum = slack.sum();
        if residual.abs() > 0.0 && slack_sum > 0.0 {
            w += slack * (residual / slack_sum);
        }
        self.w = w;

        for i in 0..n {
            self.working[i] = if self.bounds.is_pinned(i) || self.w[i] <= self.bounds.lower[i] {
                Some(Active::Lower)
            } else if self.w[i] >= self.bounds.upper[i] {
                Some(Active::Upper)
            } else {
                None
            };
        }
    }

    fn gradient(&self) -> DVector<f64> {
        &self.hessian * &self.w - self.mu
    }

    fn free(&self) -> Vec<usize> {
        (0..self.w.len()).filter(|&i| self.working[i].is_none()).collect()
    }

    fn run(&mut self) -> Result<(DVector<f64>, usize), LittermanError> {
        let tol = self.config.tolerance;
        for iteration in 0..self.config.max_iterations {
            let g = self.gradient();
            let free = self.free();

            if free.is_empty() {
                if !self.release_from_vertex(&g) {
                    return Ok((self.w.clone(), iteration));
                }
                continue;
            }

            let step = self.step_direction(&g, &free);
            if step.direction.amax() > tol {
                self.take_step(&step, &free);
            } else if !self.release_violated(&g, step.nu) {
                return Ok((self.w.clone(), iteration));
            }
        }
        Err(LittermanError::OptimizationFailure {
            reason: format!(
                "active-set solver did not converge within {} iterations (tolerance {:e})",
                self.config.max_iterations, tol
            ),
        })
    }

    fn step_direction(&self, g: &DVector<f64>, free: &[usize]) -> Step {
        let n = self.w.len();
        let k = free.len();
        let mut p = DVector::zeros(n);
        if k == 1 {
            // The budget leaves a single free variable no room to move.
            return Step {
                direction: p,
                nu: -g[free[0]],
                max_alpha: 1.0,
            };
        }

        let g_free = DVector::from_iterator(k, free.iter().map(|&i| g[i]));
        let mean = g_free.mean();
        let reduced_gradient = g_free.add_scalar(-mean);
        let h_free = DMatrix::from_fn(k, k, |a, b| self.hessian[(free[a], free[b])]);
        let projector = DMatrix::<f64>::identity(k, k) - DMatrix::from_element(k, k, 1.0 / k as f64);
        let reduced = &projector * h_free * &projector;
        let reduced = (&reduced + reduced.transpose()) * 0.5;

        let eigen = reduced.symmetric_eigen();
        let cutoff = NULL_SPACE_RATIO * eigen.eigenvalues.amax();
        let mut newton = DVector::<f64>::zeros(k);
        let mut flat = DVector::<f64>::zeros(k);
        for (e, &value) in eigen.eigenvalues.iter().enumerate() {
            let v = eigen.eigenvectors.column(e);
            let c = v.dot(&reduced_gradient);
            if value > cutoff && value > 0.0 {
                newton -= v * (c / value);
            } else {
                flat += v * c;
            }
        }
        let flat = flat.add_scalar(-flat.mean());

        if flat.norm() > FLAT_DIRECTION_EPS * g.amax().max(1.0) {
            // Zero curvature: the objective falls linearly until a bound blocks.
            tracing::debug!(free = k, "singular reduced Hessian, following null-space direction");
            for (a, &i) in free.iter().enumerate() {
                p[i] = -flat[a];
            }
            let curvature = (&self.hessian * &p).dot(&p);
            let slope = g.dot(&p);
            let max_alpha = if curvature > 0.0 {
                -slope / curvature
            } else {
                f64::INFINITY
            };
            return Step {
                direction: p,
                nu: -mean,
                max_alpha,
            };
        }

        let newton = newton.add_scalar(-newton.mean());
        for (a, &i) in free.iter().enumerate() {
            p[i] = newton[a];
        }
        let hp = &self.hessian * &p;
        let nu = -free.iter().map(|&i| g[i] + hp[i]).sum::<f64>() / k as f64;
        Step {
            direction: p,
            nu,
            max_alpha: 1.0,
        }
    }

    fn take_step(&mut self, step: &Step, free: &[usize]) {
        let p = &step.direction;
        let mut alpha = step.max_alpha;
        let mut blocking = None;
        for &i in free {
            let ratio = if p[i] < -BLOCKING_EPS {
                (self.bounds.lower[i] - self.w[i]) / p[i]
            } else if p[i] > BLOCKING_EPS {
                (self.bounds.upper[i] - self.w[i]) / p[i]
            } else {
                continue;
            };
            if ratio < alpha {
                alpha = ratio.max(0.0);
                blocking = Some((i, if p[i] < 0.0 { Active::Lower } else { Active::Upper }));
            }
        }
        if !alpha.is_finite() {
            alpha = 1.0;
        }
        for &i in free {
            self.w[i] += alpha * p[i];
        }
        if let Some((i, side)) = blocking {
            self.w[i] = match side {
                Active::Lower => self.bounds.lower[i],
                Active::Upper => self.bounds.upper[i],
            };
            self.working[i] = Some(side);
        }
        self.degenerate = alpha <= BLOCKING_EPS;
    }

    /// Bound multiplier for a fixed variable; negative means the objective
    /// improves by moving it off its bound.
    fn multiplier(&self, g: &DVector<f64>, i: usize, nu: f64) -> Option<f64> {
        if self.bounds.is_pinned(i) {
            return None;
        }
        match self.working[i]? {
            Active::Lower => Some(g[i] + nu),
            Active::Upper => Some(-(g[i] + nu)),
        }
    }

    fn release_violated(&mut self, g: &DVector<f64>, nu: f64) -> bool {
        let threshold = -self.config.tolerance * g.amax().max(1.0);
        let mut violated = (0..self.w.len())
            .filter_map(|i| self.multiplier(g, i, nu).map(|z| (i, z)))
            .filter(|&(_, z)| z < threshold);
        let release = if self.degenerate {
            violated.next()
        } else {
            violated.min_by(|a, b| a.1.total_cmp(&b.1))
        };
        match release {
            Some((i, _)) => {
                self.working[i] = None;
                true
            }
            None => false,
        }
    }

    /// Every variable is fixed. A budget multiplier satisfying all bound
    /// multipliers exists iff max over lower-fixed of -g does not exceed min
    /// over upper-fixed of -g.
    fn release_from_vertex(&mut self, g: &DVector<f64>) -> bool {
        let n = self.w.len();
        let lower = (0..n)
            .filter(|&i| !self.bounds.is_pinned(i) && self.working[i] == Some(Active::Lower))
            .max_by(|&a, &b| (-g[a]).total_cmp(&-g[b]));
        let upper = (0..n)
            .filter(|&i| !self.bounds.is_pinned(i) && self.working[i] == Some(Active::Upper))
            .min_by(|&a, &b| (-g[a]).total_cmp(&-g[b]));
        let threshold = self.config.tolerance * g.amax().max(1.0);
        match (lower, upper) {
            (Some(l), Some(u)) if -g[l] > -g[u] + threshold => {
                self.working[l] = None;
                true
            }
            _ => false,
        }
    }
}
