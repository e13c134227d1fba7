//! Investor views and their encoding into a selection row.
//!
//! A view names a basket of assets and an excess return over the basket's
//! equilibrium return. Encoding yields an equal-weight selection row `P`,
//! the target `Q = P.pi + excess_return` and the uncertainty `omega`.

use crate::domain::error::LittermanError;
use crate::domain::universe::{parse_assets, AssetUniverse};
use nalgebra::{DVector, RowDVector};

pub const DEFAULT_CONFIDENCE: f64 = 1e-4;

/// The asset field of a view, as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetSpec {
    List(Vec<String>),
    /// Comma-delimited identifiers, e.g. `"IT, Financials"`.
    Delimited(String),
}

impl AssetSpec {
    /// Resolves to trimmed, non-empty identifiers.
    pub fn identifiers(&self) -> Vec<String> {
        match self {
            AssetSpec::Delimited(s) => parse_assets(s),
            AssetSpec::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct View {
    pub assets: Option<AssetSpec>,
    pub excess_return: Option<f64>,
    pub confidence: Option<f64>,
}

impl View {
    pub fn on(assets: &str) -> Self {
        Self {
            assets: Some(AssetSpec::Delimited(assets.to_string())),
            ..Self::default()
        }
    }

    pub fn on_list<S: AsRef<str>>(assets: &[S]) -> Self {
        Self {
            assets: Some(AssetSpec::List(
                assets.iter().map(|a| a.as_ref().to_string()).collect(),
            )),
            ..Self::default()
        }
    }

    pub fn with_excess_return(mut self, excess_return: f64) -> Self {
        self.excess_return = Some(excess_return);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedView {
    /// Matched assets in universe order.
    pub assets: Vec<String>,
    pub row: RowDVector<f64>,
    pub target: f64,
    pub uncertainty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingAssets,
    EmptyAssets,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Encoded(EncodedView),
    Skip(SkipReason),
}

pub fn encode_view(
    view: &View,
    universe: &AssetUniverse,
    pi: &DVector<f64>,
) -> Result<ViewOutcome, LittermanError> {
    let spec = match &view.assets {
        None => return Ok(ViewOutcome::Skip(SkipReason::MissingAssets)),
        Some(spec) => spec,
    };
    let requested = spec.identifiers();
    if requested.is_empty() {
        return Ok(ViewOutcome::Skip(SkipReason::EmptyAssets));
    }

    let indices: Vec<usize> = (0..universe.len())
        .filter(|&i| requested.iter().any(|a| *a == universe.as_slice()[i]))
        .collect();
    if indices.is_empty() {
        return Err(LittermanError::InvalidView {
            reason: format!(
                "none of the view assets match the portfolio: {}",
                requested.join(", ")
            ),
        });
    }
    let unknown: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|a| !universe.contains(a))
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(ignored = %unknown.join(", "), "view names assets outside the portfolio");
    }

    let excess_return = view.excess_return.unwrap_or(0.0);
    if !excess_return.is_finite() {
        return Err(LittermanError::InvalidView {
            reason: format!("excess_return must be finite, got {excess_return}"),
        });
    }
    let confidence = view.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !confidence.is_finite() || confidence <= 0.0 {
        return Err(LittermanError::InvalidView {
            reason: format!("confidence must be strictly positive, got {confidence}"),
        });
    }

    let k = indices.len() as f64;
    let mut row = RowDVector::zeros(universe.len());
    for &i in &indices {
        row[i] = 1.0 / k;
    }
    let target = (&row * pi)[0] + excess_return;

    Ok(ViewOutcome::Encoded(EncodedView {
        assets: indices
            .iter()
            .map(|&i| universe.as_slice()[i].clone())
            .collect(),
        row,
        target,
        uncertainty: confidence,
    }))
}
