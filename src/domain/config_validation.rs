//! Configuration validation.
//!
//! Validates every known section up front, before any price data is loaded.

use crate::domain::error::LittermanError;
use crate::domain::estimator::ReturnMethod;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const VIEW_SECTION_PREFIX: &str = "view.";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    validate_model_config(config)?;
    validate_optimizer_config(config)?;
    validate_data_config(config)?;
    validate_report_config(config)?;
    validate_view_configs(config)?;
    Ok(())
}

pub fn validate_model_config(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    match parse_double(config, "model", "risk_aversion")? {
        None => {
            return Err(LittermanError::ConfigMissing {
                section: "model".to_string(),
                key: "risk_aversion".to_string(),
            })
        }
        Some(v) if v <= 0.0 => {
            return Err(invalid("model", "risk_aversion", "risk_aversion must be positive"))
        }
        Some(_) => {}
    }
    if let Some(tau) = parse_double(config, "model", "tau")? {
        if tau <= 0.0 {
            return Err(invalid("model", "tau", "tau must be positive"));
        }
    }
    if let Some(method) = config.get_string("model", "return_method") {
        method
            .parse::<ReturnMethod>()
            .map_err(|_| invalid("model", "return_method", "return_method must be log or simple"))?;
    }
    validate_bool(config, "model", "annualize")?;
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    if let Some(d) = parse_double(config, "optimizer", "max_deviation")? {
        if !(0.0..1.0).contains(&d) {
            return Err(invalid(
                "optimizer",
                "max_deviation",
                "max_deviation must be in [0, 1)",
            ));
        }
    }
    if let Some(raw) = config.get_string("optimizer", "max_iterations") {
        match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => {}
            _ => {
                return Err(invalid(
                    "optimizer",
                    "max_iterations",
                    "max_iterations must be a positive integer",
                ))
            }
        }
    }
    if let Some(tol) = parse_double(config, "optimizer", "tolerance")? {
        if tol <= 0.0 {
            return Err(invalid("optimizer", "tolerance", "tolerance must be positive"));
        }
    }
    Ok(())
}

/// Paths may also come from the command line, so only their shape is
/// checked here.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    for key in ["prices", "composition"] {
        if let Some(path) = config.get_string("data", key) {
            if path.trim().is_empty() {
                return Err(invalid("data", key, &format!("{key} path must not be empty")));
            }
        }
    }
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid("data", "start_date", "start_date must be before end_date"));
        }
    }
    Ok(())
}

pub fn validate_report_config(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    if let Some(format) = config.get_string("report", "format") {
        match format.trim().to_ascii_lowercase().as_str() {
            "csv" | "json" => {}
            _ => return Err(invalid("report", "format", "format must be csv or json")),
        }
    }
    Ok(())
}

pub fn validate_view_configs(config: &dyn ConfigPort) -> Result<(), LittermanError> {
    // A section without `assets` is a no-op view and passes.
    for section in view_sections(config) {
        parse_double(config, &section, "excess_return")?;
        if let Some(c) = parse_double(config, &section, "confidence")? {
            if c <= 0.0 {
                return Err(LittermanError::InvalidView {
                    reason: format!("[{section}] confidence must be strictly positive, got {c}"),
                });
            }
        }
    }
    Ok(())
}

/// `[view.*]` section names, sorted.
pub fn view_sections(config: &dyn ConfigPort) -> Vec<String> {
    let mut sections: Vec<String> = config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(VIEW_SECTION_PREFIX))
        .collect();
    sections.sort();
    sections
}

/// Reads an optional float, rejecting values that are present but not
/// finite numbers.
pub fn parse_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, LittermanError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("{key} must be a number, got '{raw}'"))),
        },
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), LittermanError> {
    match config.get_string(section, key) {
        None => Ok(()),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
            _ => Err(invalid(section, key, &format!("{key} must be a boolean"))),
        },
    }
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<Option<NaiveDate>, LittermanError> {
    match config.get_string("data", field) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid("data", field, &format!("invalid {field} format, expected YYYY-MM-DD"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> LittermanError {
    LittermanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
