//! CSV weight report implementing ReportPort.
//!
//! One row per asset in portfolio order:
//! `asset,market_weight,equilibrium_return,posterior_return,weight`.

use crate::domain::error::LittermanError;
use crate::domain::model::Allocation;
use crate::ports::report_port::ReportPort;
use std::path::Path;

pub const HEADER: [&str; 5] = [
    "asset",
    "market_weight",
    "equilibrium_return",
    "posterior_return",
    "weight",
];

pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, allocation: &Allocation, output_path: &Path) -> Result<(), LittermanError> {
        let mut writer = csv::Writer::from_path(output_path).map_err(csv_err)?;
        writer.write_record(HEADER).map_err(csv_err)?;

        for (i, (asset, weight)) in allocation.weights.iter().enumerate() {
            writer
                .write_record([
                    asset.to_string(),
                    allocation.market_weights[i].to_string(),
                    allocation.equilibrium[i].to_string(),
                    allocation.posterior[i].to_string(),
                    weight.to_string(),
                ])
                .map_err(csv_err)?;
        }

        writer.flush()?;
        tracing::debug!(path = %output_path.display(), "wrote CSV report");
        Ok(())
    }
}

fn csv_err(e: csv::Error) -> LittermanError {
    LittermanError::Data {
        reason: format!("CSV write error: {e}"),
    }
}
