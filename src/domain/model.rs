//! Black–Litterman engine.
//!
//! [`BlackLittermanBuilder`] performs the expensive estimation once and
//! returns an immutable [`BlackLitterman`] value. Returns, covariance and
//! equilibrium returns are cached on the value and never recomputed; views,
//! posterior returns and weights are produced per call.

use crate::domain::equilibrium::equilibrium_returns;
use crate::domain::error::LittermanError;
use crate::domain::estimator::{estimate, ReturnMatrix, ReturnMethod};
use crate::domain::optimizer::{optimize, OptimizerConfig};
use crate::domain::posterior::{posterior_returns, DEFAULT_TAU};
use crate::domain::price_table::PriceTable;
use crate::domain::universe::{AssetUniverse, MarketComposition};
use crate::domain::view::View;
use crate::domain::view_set::{aggregate_views, ViewSet};
use nalgebra::{DMatrix, DVector};
use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone)]
pub struct BlackLittermanBuilder {
    composition: MarketComposition,
    prices: PriceTable,
    risk_aversion: Option<f64>,
    tau: f64,
    return_method: ReturnMethod,
    annualize: bool,
    optimizer: OptimizerConfig,
}

impl BlackLittermanBuilder {
    pub fn new(composition: MarketComposition, prices: PriceTable) -> Self {
        Self {
            composition,
            prices,
            risk_aversion: None,
            tau: DEFAULT_TAU,
            return_method: ReturnMethod::default(),
            annualize: true,
            optimizer: OptimizerConfig::default(),
        }
    }

    pub fn risk_aversion(mut self, risk_aversion: f64) -> Self {
        self.risk_aversion = Some(risk_aversion);
        self
    }

    pub fn tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn return_method(mut self, method: ReturnMethod) -> Self {
        self.return_method = method;
        self
    }

    pub fn annualize(mut self, annualize: bool) -> Self {
        self.annualize = annualize;
        self
    }

    pub fn optimizer(mut self, config: OptimizerConfig) -> Self {
        self.optimizer = config;
        self
    }

    pub fn build(self) -> Result<BlackLitterman, LittermanError> {
        let risk_aversion = self.risk_aversion.ok_or_else(|| {
            LittermanError::invalid_parameter("risk_aversion", "a risk aversion coefficient is required")
        })?;
        if !risk_aversion.is_finite() || risk_aversion <= 0.0 {
            return Err(LittermanError::invalid_parameter(
                "risk_aversion",
                format!("must be strictly positive, got {risk_aversion}"),
            ));
        }
        if !self.tau.is_finite() || self.tau <= 0.0 {
            return Err(LittermanError::invalid_parameter(
                "tau",
                format!("must be strictly positive, got {}", self.tau),
            ));
        }
        if self.optimizer.tolerance <= 0.0 || !self.optimizer.tolerance.is_finite() {
            return Err(LittermanError::invalid_parameter(
                "tolerance",
                "optimizer tolerance must be strictly positive",
            ));
        }

        let universe = self.composition.universe();
        let market_weights = DVector::from_vec(self.composition.normalized_weights());
        let (returns, covariance) =
            estimate(&self.prices, &universe, self.return_method, self.annualize)?;
        let pi = equilibrium_returns(&covariance, &market_weights, risk_aversion)?;
        tracing::debug!(assets = universe.len(), risk_aversion, tau = self.tau, "model built");

        Ok(BlackLitterman {
            universe,
            market_weights,
            returns,
            covariance,
            equilibrium: pi,
            risk_aversion,
            tau: self.tau,
            optimizer: self.optimizer,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlackLitterman {
    universe: AssetUniverse,
    market_weights: DVector<f64>,
    returns: ReturnMatrix,
    covariance: DMatrix<f64>,
    equilibrium: DVector<f64>,
    risk_aversion: f64,
    tau: f64,
    optimizer: OptimizerConfig,
}

impl BlackLitterman {
    pub fn builder(composition: MarketComposition, prices: PriceTable) -> BlackLittermanBuilder {
        BlackLittermanBuilder::new(composition, prices)
    }

    pub fn universe(&self) -> &AssetUniverse {
        &self.universe
    }

    /// Market weights normalized to sum to 1.
    pub fn market_weights(&self) -> &DVector<f64> {
        &self.market_weights
    }

    pub fn returns(&self) -> &ReturnMatrix {
        &self.returns
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn equilibrium_returns(&self) -> &DVector<f64> {
        &self.equilibrium
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn views(&self, views: &[View]) -> Result<ViewSet, LittermanError> {
        aggregate_views(views, &self.universe, &self.equilibrium)
    }

    pub fn posterior_returns(&self, views: &ViewSet) -> Result<DVector<f64>, LittermanError> {
        posterior_returns(&self.equilibrium, &self.covariance, self.tau, views)
    }

    pub fn optimal_weights(
        &self,
        mu: &DVector<f64>,
        max_deviation: f64,
    ) -> Result<OptimalWeights, LittermanError> {
        let solution = optimize(
            mu,
            &self.covariance,
            self.risk_aversion,
            &self.market_weights,
            max_deviation,
            &self.optimizer,
        )?;
        let w = &solution.weights;
        Ok(OptimalWeights {
            assets: self.universe.as_slice().to_vec(),
            expected_return: mu.dot(w),
            volatility: (&self.covariance * w).dot(w).max(0.0).sqrt(),
            weights: solution.weights,
        })
    }

    /// Views -> posterior -> bounded weights.
    pub fn allocate(&self, views: &[View], max_deviation: f64) -> Result<Allocation, LittermanError> {
        let view_set = self.views(views)?;
        let posterior = self.posterior_returns(&view_set)?;
        let weights = self.optimal_weights(&posterior, max_deviation)?;
        Ok(Allocation {
            market_weights: self.market_weights.clone(),
            equilibrium: self.equilibrium.clone(),
            posterior,
            view_count: view_set.count(),
            weights,
        })
    }
}

/// Optimized weights keyed by asset, in universe order.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimalWeights {
    assets: Vec<String>,
    weights: DVector<f64>,
    expected_return: f64,
    volatility: f64,
}

impl OptimalWeights {
    pub fn get(&self, asset: &str) -> Option<f64> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.weights[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.assets
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.weights.sum()
    }

    /// mu'w for the returns the weights were optimized against.
    pub fn expected_return(&self) -> f64 {
        self.expected_return
    }

    /// sqrt(w'Sigma w).
    pub fn volatility(&self) -> f64 {
        self.volatility
    }
}

impl Serialize for OptimalWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (asset, weight) in self.iter() {
            map.serialize_entry(asset, &weight)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub market_weights: DVector<f64>,
    pub equilibrium: DVector<f64>,
    pub posterior: DVector<f64>,
    pub view_count: usize,
    pub weights: OptimalWeights,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn composition() -> MarketComposition {
        MarketComposition::new(vec![("A".into(), 3.0), ("B".into(), 2.0)]).unwrap()
    }

    fn prices() -> PriceTable {
        let a = [100.0, 101.0, 100.5, 102.0, 103.5, 102.8, 104.0];
        let b = [50.0, 49.5, 50.5, 50.2, 51.0, 51.8, 51.1];
        let mut table = PriceTable::new();
        for (i, (pa, pb)) in a.iter().zip(b.iter()).enumerate() {
            let date = NaiveDate::from_ymd_opt(2024, 3, i as u32 + 1).unwrap();
            table.insert(date, "A", *pa).unwrap();
            table.insert(date, "B", *pb).unwrap();
        }
        table
    }

    #[test]
    fn build_requires_risk_aversion() {
        let err = BlackLitterman::builder(composition(), prices()).build().unwrap_err();
        assert!(matches!(err, LittermanError::InvalidParameter { name, .. } if name == "risk_aversion"));
    }

    #[test]
    fn build_rejects_non_positive_tau() {
        let err = BlackLitterman::builder(composition(), prices())
            .risk_aversion(3.0)
            .tau(0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, LittermanError::InvalidParameter { name, .. } if name == "tau"));
    }

    #[test]
    fn caches_normalized_weights_and_equilibrium() {
        let model = BlackLitterman::builder(composition(), prices())
            .risk_aversion(2.5)
            .build()
            .unwrap();
        assert_eq!(model.market_weights().as_slice(), &[0.6, 0.4]);
        let expected = model.covariance() * model.market_weights() * 2.5;
        assert_eq!(model.equilibrium_returns(), &expected);
        assert_eq!(model.returns().rows(), 6);
    }

    #[test]
    fn weights_serialize_in_universe_order() {
        let model = BlackLitterman::builder(composition(), prices())
            .risk_aversion(3.0)
            .build()
            .unwrap();
        let weights = model
            .optimal_weights(&model.equilibrium_returns().clone(), 0.0)
            .unwrap();
        let json = serde_json::to_string(&weights).unwrap();
        assert!(json.starts_with("{\"A\":"));
        assert!(json.contains(",\"B\":"));
    }

    #[test]
    fn model_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BlackLitterman>();
    }
}
