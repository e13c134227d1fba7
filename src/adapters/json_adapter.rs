//! JSON request/response adapter.
//!
//! A request carries the whole allocation problem in one document:
//!
//! ```json
//! {
//!   "market_composition": {"IT": 30, "Energy": 10},
//!   "risk_aversion": 3,
//!   "max_deviation": 0.2,
//!   "views": [{"assets": "IT", "excess_return": 0.02}],
//!   "price_data": {"2024-01-02": {"IT": 101.0, "Energy": 50.0}}
//! }
//! ```
//!
//! The response is `{asset: weight}` on success or `{"error": message}`.

use crate::domain::error::LittermanError;
use crate::domain::model::{Allocation, BlackLitterman, OptimalWeights};
use crate::domain::optimizer::DEFAULT_MAX_DEVIATION;
use crate::domain::price_table::PriceTable;
use crate::domain::universe::MarketComposition;
use crate::domain::view::{AssetSpec, View};
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawRequest {
    market_composition: Option<Map<String, Value>>,
    risk_aversion: Option<f64>,
    max_deviation: Option<f64>,
    tau: Option<f64>,
    #[serde(default)]
    views: Vec<RawView>,
    price_data: Option<BTreeMap<String, BTreeMap<String, Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct RawView {
    #[serde(default)]
    assets: Value,
    excess_return: Option<f64>,
    confidence: Option<f64>,
}

/// A validated allocation request.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub composition: MarketComposition,
    pub risk_aversion: f64,
    pub max_deviation: f64,
    pub tau: Option<f64>,
    pub views: Vec<View>,
    pub prices: PriceTable,
}

impl AllocationRequest {
    pub fn from_json(input: &str) -> Result<Self, LittermanError> {
        let raw: RawRequest = serde_json::from_str(input)?;

        let composition = raw
            .market_composition
            .ok_or_else(|| missing("market_composition"))?;
        let composition = MarketComposition::new(
            composition
                .into_iter()
                .map(|(asset, weight)| {
                    weight
                        .as_f64()
                        .map(|w| (asset.clone(), w))
                        .ok_or_else(|| LittermanError::InvalidParameter {
                            name: "market_composition".to_string(),
                            reason: format!("weight for {asset} is not a number"),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        let risk_aversion = raw.risk_aversion.ok_or_else(|| missing("risk_aversion"))?;
        let prices = price_table(raw.price_data.ok_or_else(|| missing("price_data"))?)?;
        let views = raw
            .views
            .into_iter()
            .map(RawView::into_view)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            composition,
            risk_aversion,
            max_deviation: raw.max_deviation.unwrap_or(DEFAULT_MAX_DEVIATION),
            tau: raw.tau,
            views,
            prices,
        })
    }

    /// Builds a fresh model for this request and runs the full pipeline.
    pub fn allocate(self) -> Result<Allocation, LittermanError> {
        let mut builder = BlackLitterman::builder(self.composition, self.prices)
            .risk_aversion(self.risk_aversion);
        if let Some(tau) = self.tau {
            builder = builder.tau(tau);
        }
        builder.build()?.allocate(&self.views, self.max_deviation)
    }
}

impl RawView {
    fn into_view(self) -> Result<View, LittermanError> {
        let assets = match self.assets {
            Value::Null => None,
            Value::String(s) => Some(AssetSpec::Delimited(s)),
            Value::Array(items) => Some(AssetSpec::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(LittermanError::InvalidView {
                            reason: format!("asset identifiers must be strings, got {other}"),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            other => {
                return Err(LittermanError::InvalidView {
                    reason: format!("assets must be a string or a list of strings, got {other}"),
                })
            }
        };
        Ok(View {
            assets,
            excess_return: self.excess_return,
            confidence: self.confidence,
        })
    }
}

fn price_table(
    data: BTreeMap<String, BTreeMap<String, Option<f64>>>,
) -> Result<PriceTable, LittermanError> {
    let mut table = PriceTable::new();
    for (date_str, row) in data {
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
            LittermanError::Data {
                reason: format!("invalid date '{date_str}': {e}"),
            }
        })?;
        for (asset, price) in row {
            table.add_column(&asset);
            if let Some(price) = price {
                table.insert(date, &asset, price)?;
            }
        }
    }
    Ok(table)
}

fn missing(field: &str) -> LittermanError {
    LittermanError::InputMismatch {
        reason: format!("request is missing '{field}'"),
    }
}

/// Runs a JSON request end to end. Never fails: errors become
/// `{"error": message}`.
pub fn handle_request(input: &str) -> Value {
    match AllocationRequest::from_json(input).and_then(AllocationRequest::allocate) {
        Ok(allocation) => weights_response(&allocation.weights),
        Err(e) => {
            tracing::debug!(error = %e, "request failed");
            error_response(&e)
        }
    }
}

pub fn weights_response(weights: &OptimalWeights) -> Value {
    let map: Map<String, Value> = weights
        .iter()
        .map(|(asset, w)| (asset.to_string(), json!(w)))
        .collect();
    Value::Object(map)
}

pub fn error_response(err: &LittermanError) -> Value {
    json!({ "error": err.to_string() })
}

/// JSON weight report implementing ReportPort.
pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(&self, allocation: &Allocation, output_path: &Path) -> Result<(), LittermanError> {
        let body = serde_json::to_string_pretty(&allocation.weights)?;
        fs::write(output_path, body)?;
        tracing::debug!(path = %output_path.display(), "wrote JSON report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICES: &str = r#"{
        "2024-01-01": {"A": 100.0, "B": 50.0},
        "2024-01-02": {"A": 101.0, "B": 49.5},
        "2024-01-03": {"A": 100.5, "B": 50.5},
        "2024-01-04": {"A": 102.0, "B": 50.2},
        "2024-01-05": {"A": 103.5, "B": 51.0},
        "2024-01-06": {"A": 102.8, "B": 51.8}
    }"#;

    fn request(extra: &str) -> String {
        format!(
            r#"{{"market_composition": {{"B": 2, "A": 3}}, "risk_aversion": 3, "price_data": {PRICES}{extra}}}"#
        )
    }

    #[test]
    fn parses_minimal_request_with_defaults() {
        let req = AllocationRequest::from_json(&request("")).unwrap();
        assert_eq!(req.composition.assets(), vec!["B", "A"]);
        assert_eq!(req.risk_aversion, 3.0);
        assert_eq!(req.max_deviation, DEFAULT_MAX_DEVIATION);
        assert!(req.views.is_empty());
        assert_eq!(req.prices.len(), 6);
    }

    #[test]
    fn missing_required_fields_are_input_errors() {
        let err = AllocationRequest::from_json(r#"{"risk_aversion": 3, "price_data": {}}"#)
            .unwrap_err();
        assert!(matches!(err, LittermanError::InputMismatch { reason } if reason.contains("market_composition")));

        let err = AllocationRequest::from_json(r#"{"market_composition": {"A": 1}, "price_data": {}}"#)
            .unwrap_err();
        assert!(matches!(err, LittermanError::InputMismatch { reason } if reason.contains("risk_aversion")));

        let err = AllocationRequest::from_json(r#"{"market_composition": {"A": 1}, "risk_aversion": 3}"#)
            .unwrap_err();
        assert!(matches!(err, LittermanError::InputMismatch { reason } if reason.contains("price_data")));
    }

    #[test]
    fn view_assets_accept_string_list_and_null() {
        let req = AllocationRequest::from_json(&request(
            r#", "views": [{"assets": "A, B"}, {"assets": ["A"], "excess_return": 0.01}, {"assets": null}, {}]"#,
        ))
        .unwrap();
        assert_eq!(req.views.len(), 4);
        assert_eq!(req.views[0].assets, Some(AssetSpec::Delimited("A, B".into())));
        assert_eq!(req.views[1].assets, Some(AssetSpec::List(vec!["A".into()])));
        assert_eq!(req.views[1].excess_return, Some(0.01));
        assert_eq!(req.views[2].assets, None);
        assert_eq!(req.views[3].assets, None);
    }

    #[test]
    fn non_string_assets_are_invalid_views() {
        let err = AllocationRequest::from_json(&request(r#", "views": [{"assets": 42}]"#))
            .unwrap_err();
        assert!(matches!(err, LittermanError::InvalidView { .. }));

        let err = AllocationRequest::from_json(&request(r#", "views": [{"assets": ["A", 1]}]"#))
            .unwrap_err();
        assert!(matches!(err, LittermanError::InvalidView { .. }));
    }

    #[test]
    fn null_prices_are_missing_cells() {
        let req = AllocationRequest::from_json(
            r#"{"market_composition": {"A": 1}, "risk_aversion": 3,
                "price_data": {"2024-01-01": {"A": null}, "2024-01-02": {"A": 10.0}}}"#,
        )
        .unwrap();
        assert!(req.prices.has_column("A"));
        assert_eq!(req.prices.len(), 1);
    }

    #[test]
    fn handle_request_returns_weights_in_composition_order() {
        let response = handle_request(&request(r#", "max_deviation": 0.0"#));
        let obj = response.as_object().unwrap();
        let keys: Vec<&String> = obj.keys().collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert!((obj["A"].as_f64().unwrap() - 0.6).abs() < 1e-9);
        assert!((obj["B"].as_f64().unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn handle_request_reports_errors() {
        let response = handle_request(r#"{"market_composition": {"A": 1}}"#);
        let message = response["error"].as_str().unwrap();
        assert!(message.contains("risk_aversion"));

        let response = handle_request("not json");
        assert!(response.get("error").is_some());
    }
}
