//! GEMM workloads and the topology descriptor handed to the simulator.

use std::path::{Path, PathBuf};

use eyre::{ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};

use crate::sparsity::SparsityRatio;

/// one GEMM layer, `M x K` times `K x N`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub m: u64,
    pub n: u64,
    pub k: u64,
    /// the layer's own ratio, used when no sparsity axis overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparsity: Option<SparsityRatio>,
}

impl Layer {
    pub fn new(name: impl Into<String>, m: u64, n: u64, k: u64) -> Self {
        Self {
            name: name.into(),
            m,
            n,
            k,
            sparsity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub layers: Vec<Layer>,
}

impl Default for Workload {
    /// the single GEMM used by the layer-wise sparsity studies
    fn default() -> Self {
        Self {
            name: "gemm".to_string(),
            layers: vec![Layer::new("L0", 256, 512, 768)],
        }
    }
}

impl Workload {
    /// read a `L,M,N,K[,Sparsity]` topology file
    pub fn from_topology(name: impl Into<String>, path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .wrap_err_with(|| format!("cannot open topology file {path:?}"))?;
        let mut layers = vec![];
        for (line, record) in reader.records().enumerate() {
            let record =
                record.wrap_err_with(|| format!("bad row {} in topology {path:?}", line + 2))?;
            let row = line + 2;
            let number = |index: usize| -> eyre::Result<u64> {
                let text = column(&record, index, row, path)?;
                text.parse()
                    .wrap_err_with(|| format!("bad number {text:?} in row {row} of {path:?}"))
            };
            let mut layer = Layer::new(
                column(&record, 0, row, path)?,
                number(1)?,
                number(2)?,
                number(3)?,
            );
            layer.sparsity = match record.get(4).filter(|f| !f.is_empty()) {
                Some(ratio) => Some(ratio.parse()?),
                None => None,
            };
            layers.push(layer);
        }
        let workload = Self {
            name: name.into(),
            layers,
        };
        workload.validate()?;
        Ok(workload)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        ensure!(
            !self.layers.is_empty(),
            "workload {:?} has no layers",
            self.name
        );
        Ok(())
    }
}

fn column<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    row: usize,
    path: &Path,
) -> eyre::Result<&'r str> {
    record
        .get(index)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| eyre!("row {row} of {path:?} misses column {index}"))
}

/// How a workload is written in the sweep file: inline layers or a topology file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadSpec {
    pub name: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
    pub topology: Option<PathBuf>,
}

impl WorkloadSpec {
    pub fn resolve(&self) -> eyre::Result<Workload> {
        match &self.topology {
            Some(path) => {
                ensure!(
                    self.layers.is_empty(),
                    "workload {:?} sets both layers and a topology file",
                    self.name
                );
                Workload::from_topology(&self.name, path)
            }
            None => {
                let workload = Workload {
                    name: self.name.clone(),
                    layers: self.layers.clone(),
                };
                workload.validate()?;
                Ok(workload)
            }
        }
    }
}

/// The topology file of one point: every layer with the ratio it runs at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    pub workload: String,
    pub rows: Vec<(Layer, SparsityRatio)>,
}

impl WorkloadDescriptor {
    /// pair the layers with `ratios`, which must be as long as the layer list
    pub fn new(workload: &Workload, ratios: Vec<SparsityRatio>) -> Self {
        debug_assert_eq!(workload.layers.len(), ratios.len());
        Self {
            workload: workload.name.clone(),
            rows: workload.layers.iter().cloned().zip(ratios).collect(),
        }
    }

    /// render the `L,M,N,K,Sparsity,` file the simulator reads in gemm mode
    pub fn render(&self) -> eyre::Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(vec![]);
        writer.write_record(["L", "M", "N", "K", "Sparsity", ""])?;
        for (layer, ratio) in &self.rows {
            writer.write_record([
                layer.name.clone(),
                layer.m.to_string(),
                layer.n.to_string(),
                layer.k.to_string(),
                ratio.to_string(),
                String::new(),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| eyre!("{e}"))?;
        Ok(String::from_utf8(bytes)?)
    }
}
