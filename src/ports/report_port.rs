//! Report generation port trait.

use crate::domain::error::LittermanError;
use crate::domain::model::Allocation;
use std::path::Path;

/// Port for writing allocation reports.
pub trait ReportPort {
    fn write(&self, allocation: &Allocation, output_path: &Path) -> Result<(), LittermanError>;
}
