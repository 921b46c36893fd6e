use std::path::Path;

use eyre::{ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};

pub const COMPUTE_REPORT: &str = "COMPUTE_REPORT.csv";

/// the cycles of one layer in a compute report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerCycles {
    pub layer_id: u32,
    pub total_cycles: u64,
}

/// Read the `LayerID` and `Total Cycles` columns of a compute report.
///
/// The simulator pads its header names with spaces, so headers and fields are trimmed.
pub fn read_compute_report(path: impl AsRef<Path>) -> eyre::Result<Vec<LayerCycles>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .wrap_err_with(|| format!("cannot open compute report {path:?}"))?;
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| eyre!("compute report {path:?} has no {name:?} column"))
    };
    let layer_column = position("LayerID")?;
    let cycles_column = position("Total Cycles")?;

    let mut layers = vec![];
    for record in reader.records() {
        let record = record.wrap_err_with(|| format!("bad row in {path:?}"))?;
        let field = |index: usize| record.get(index).unwrap_or_default();
        let layer_id = field(layer_column)
            .parse()
            .wrap_err_with(|| format!("bad layer id {:?} in {path:?}", field(layer_column)))?;
        // some simulator versions print cycles as floats
        let cycles = field(cycles_column)
            .parse::<f64>()
            .wrap_err_with(|| format!("bad cycle count {:?} in {path:?}", field(cycles_column)))?;
        ensure!(
            cycles.is_finite() && cycles >= 0.0,
            "bad cycle count {:?} in {path:?}",
            field(cycles_column)
        );
        let total_cycles = cycles as u64;
        layers.push(LayerCycles {
            layer_id,
            total_cycles,
        });
    }
    Ok(layers)
}
