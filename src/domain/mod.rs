//! Core domain types and logic.

pub mod error;
pub mod universe;
pub mod price_table;
pub mod estimator;
pub mod equilibrium;
pub mod view;
pub mod view_set;
pub mod posterior;
pub mod optimizer;
pub mod model;
pub mod metrics;
pub mod config_validation;
