//! Asset universe and market composition.
//!
//! The universe fixes the order in which every per-asset vector, matrix row
//! and weight is indexed. It is defined by the key order of the market
//! composition.

use crate::domain::error::LittermanError;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUniverse {
    assets: Vec<String>,
}

impl AssetUniverse {
    pub fn new(assets: Vec<String>) -> Result<Self, LittermanError> {
        if assets.is_empty() {
            return Err(LittermanError::invalid_parameter(
                "market_composition",
                "at least one asset is required",
            ));
        }
        let mut seen = HashSet::new();
        for asset in &assets {
            if asset.trim().is_empty() {
                return Err(LittermanError::invalid_parameter(
                    "market_composition",
                    "asset identifiers must be non-empty",
                ));
            }
            if !seen.insert(asset.as_str()) {
                return Err(LittermanError::invalid_parameter(
                    "market_composition",
                    format!("duplicate asset: {asset}"),
                ));
            }
        }
        Ok(Self { assets })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn index_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.index_of(asset).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.assets
    }
}

/// Market baseline weights, kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketComposition {
    entries: Vec<(String, f64)>,
}

impl MarketComposition {
    pub fn new(entries: Vec<(String, f64)>) -> Result<Self, LittermanError> {
        let composition = Self { entries };
        composition.validate()?;
        Ok(composition)
    }

    fn validate(&self) -> Result<(), LittermanError> {
        AssetUniverse::new(self.assets())?;
        for (asset, weight) in &self.entries {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(LittermanError::invalid_parameter(
                    "market_composition",
                    format!("weight for {asset} must be a finite non-negative number"),
                ));
            }
        }
        if self.total() <= 0.0 {
            return Err(LittermanError::invalid_parameter(
                "market_composition",
                "weights must sum to a positive value",
            ));
        }
        Ok(())
    }

    pub fn assets(&self) -> Vec<String> {
        self.entries.iter().map(|(a, _)| a.clone()).collect()
    }

    pub fn universe(&self) -> AssetUniverse {
        AssetUniverse {
            assets: self.assets(),
        }
    }

    pub fn get(&self, asset: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(a, _)| a == asset)
            .map(|(_, w)| *w)
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Weights scaled to sum exactly to 1, in universe order.
    pub fn normalized_weights(&self) -> Vec<f64> {
        let total = self.total();
        self.entries.iter().map(|(_, w)| w / total).collect()
    }

    /// Same proportions, rescaled so the weights sum to 100.
    pub fn normalized_to_100(&self) -> Self {
        let scale = 100.0 / self.total();
        Self {
            entries: self
                .entries
                .iter()
                .map(|(a, w)| (a.clone(), w * scale))
                .collect(),
        }
    }

    /// Drops one asset from the composition. Removing an unknown asset is a
    /// no-op; removing the last remaining weight is an error.
    pub fn without(&self, asset: &str) -> Result<Self, LittermanError> {
        Self::new(
            self.entries
                .iter()
                .filter(|(a, _)| a != asset)
                .cloned()
                .collect(),
        )
    }
}

/// Splits a comma-delimited identifier list, trimming whitespace and
/// discarding empty fragments.
pub fn parse_assets(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
