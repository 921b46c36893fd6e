//! The simulator configuration of one sweep point and the preset it is filled from.

use std::{fmt::Write, str::FromStr};

use derive_more::Display;
use eyre::{ensure, eyre, WrapErr};
use serde::{Deserialize, Serialize};

use crate::sparsity::SparsityRatio;

/// geometry of the PE array, written as `HxW`
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "{}x{}", height, width)]
#[serde(try_from = "String", into = "String")]
pub struct ArrayShape {
    pub height: u32,
    pub width: u32,
}

impl ArrayShape {
    pub fn new(height: u32, width: u32) -> eyre::Result<Self> {
        ensure!(
            height > 0 && width > 0,
            "array shape {height}x{width} has an empty side"
        );
        Ok(Self { height, width })
    }
}

impl FromStr for ArrayShape {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (height, width) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| eyre!("array shape {s:?} is not of the form HxW"))?;
        let height = height
            .trim()
            .parse()
            .wrap_err_with(|| format!("bad height in array shape {s:?}"))?;
        let width = width
            .trim()
            .parse()
            .wrap_err_with(|| format!("bad width in array shape {s:?}"))?;
        Self::new(height, width)
    }
}

impl TryFrom<String> for ArrayShape {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArrayShape> for String {
    fn from(value: ArrayShape) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataflow {
    /// weight stationary
    #[default]
    #[display(fmt = "ws")]
    Ws,
    /// output stationary
    #[display(fmt = "os")]
    Os,
    /// input stationary
    #[display(fmt = "is")]
    Is,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseRep {
    #[display(fmt = "csr")]
    Csr,
    #[display(fmt = "csc")]
    Csc,
    #[default]
    #[display(fmt = "ellpack_block")]
    EllpackBlock,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterfaceBandwidth {
    /// no memory stalls
    #[display(fmt = "CALC")]
    Calc,
    /// memory stalls are simulated with the configured bandwidth
    #[default]
    #[display(fmt = "USER")]
    User,
}

/// where the block size of a point comes from when no axis sets it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BlockSizeRepr", into = "BlockSizeRepr")]
pub enum BlockSizeSetting {
    /// follow the height of the PE array
    #[default]
    ArrayHeight,
    Fixed(u32),
}

/// `"array_height"` or a plain number in the sweep file
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BlockSizeRepr {
    Named(String),
    Fixed(u32),
}

impl TryFrom<BlockSizeRepr> for BlockSizeSetting {
    type Error = eyre::Report;

    fn try_from(value: BlockSizeRepr) -> Result<Self, Self::Error> {
        match value {
            BlockSizeRepr::Named(name) if name == "array_height" => Ok(Self::ArrayHeight),
            BlockSizeRepr::Named(name) => Err(eyre!(
                "unknown block size {name:?}, expected a number or \"array_height\""
            )),
            BlockSizeRepr::Fixed(size) => {
                ensure!(size > 0, "block size must be positive");
                Ok(Self::Fixed(size))
            }
        }
    }
}

impl From<BlockSizeSetting> for BlockSizeRepr {
    fn from(value: BlockSizeSetting) -> Self {
        match value {
            BlockSizeSetting::ArrayHeight => BlockSizeRepr::Named("array_height".to_string()),
            BlockSizeSetting::Fixed(size) => BlockSizeRepr::Fixed(size),
        }
    }
}

impl BlockSizeSetting {
    pub fn resolve(&self, array: ArrayShape) -> u32 {
        match self {
            BlockSizeSetting::ArrayHeight => array.height,
            BlockSizeSetting::Fixed(size) => *size,
        }
    }
}

/// The values every point starts from before the axes override them.
///
/// The defaults are the layer-wise sparsity study setup: a 32x32 weight-stationary array with
/// 256 kB buffers, ellpack-block sparsity and a block size equal to the array height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Preset {
    pub array: ArrayShape,
    pub ifmap_sram_kb: u64,
    pub filter_sram_kb: u64,
    pub ofmap_sram_kb: u64,
    pub dataflow: Dataflow,
    pub ifmap_offset: u64,
    pub filter_offset: u64,
    pub ofmap_offset: u64,
    pub memory_banks: u32,
    pub bandwidth: u32,
    pub sparsity_support: bool,
    pub sparse_rep: SparseRep,
    pub non_zero_elems: Option<u32>,
    pub block_size: BlockSizeSetting,
    pub optimized_mapping: bool,
    pub interface_bandwidth: InterfaceBandwidth,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            array: ArrayShape {
                height: 32,
                width: 32,
            },
            ifmap_sram_kb: 256,
            filter_sram_kb: 256,
            ofmap_sram_kb: 256,
            dataflow: Dataflow::Ws,
            ifmap_offset: 0,
            filter_offset: 10_000_000,
            ofmap_offset: 20_000_000,
            memory_banks: 1,
            bandwidth: 50,
            sparsity_support: true,
            sparse_rep: SparseRep::EllpackBlock,
            non_zero_elems: None,
            block_size: BlockSizeSetting::ArrayHeight,
            optimized_mapping: false,
            interface_bandwidth: InterfaceBandwidth::User,
        }
    }
}

/// The simulator configuration of one point.
///
/// Built once per point from the [`Preset`] and the point's axis values, then only read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub run_name: String,
    pub array: ArrayShape,
    pub ifmap_sram_kb: u64,
    pub filter_sram_kb: u64,
    pub ofmap_sram_kb: u64,
    pub dataflow: Dataflow,
    pub ifmap_offset: u64,
    pub filter_offset: u64,
    pub ofmap_offset: u64,
    pub memory_banks: u32,
    pub bandwidth: u32,
    pub sparsity_support: bool,
    pub sparse_rep: SparseRep,
    pub non_zero_elems: Option<u32>,
    pub block_size: u32,
    pub optimized_mapping: bool,
    pub interface_bandwidth: InterfaceBandwidth,
}

impl ConfigRecord {
    /// the ratio written into the `[sparsity]` section, if the point has one
    pub fn sparsity_ratio(&self) -> Option<SparsityRatio> {
        self.non_zero_elems.map(|n| SparsityRatio {
            n,
            m: self.block_size,
        })
    }

    /// render the config file the simulator reads
    pub fn render(&self) -> String {
        let mut out = String::new();
        writeln!(out, "[general]").ok();
        writeln!(out, "run_name = {}", self.run_name).ok();
        writeln!(out).ok();
        writeln!(out, "[architecture_presets]").ok();
        writeln!(out, "ArrayHeight : {}", self.array.height).ok();
        writeln!(out, "ArrayWidth : {}", self.array.width).ok();
        writeln!(out, "IfmapSramSzkB : {}", self.ifmap_sram_kb).ok();
        writeln!(out, "FilterSramSzkB : {}", self.filter_sram_kb).ok();
        writeln!(out, "OfmapSramSzkB : {}", self.ofmap_sram_kb).ok();
        writeln!(out, "IfmapOffset : {}", self.ifmap_offset).ok();
        writeln!(out, "FilterOffset : {}", self.filter_offset).ok();
        writeln!(out, "OfmapOffset : {}", self.ofmap_offset).ok();
        writeln!(out, "Bandwidth : {}", self.bandwidth).ok();
        writeln!(out, "Dataflow : {}", self.dataflow).ok();
        writeln!(out, "MemoryBanks : {}", self.memory_banks).ok();
        writeln!(out).ok();
        writeln!(out, "[sparsity]").ok();
        writeln!(out, "SparsitySupport : {}", self.sparsity_support).ok();
        writeln!(out, "SparseRep : {}", self.sparse_rep).ok();
        if let Some(n) = self.non_zero_elems {
            writeln!(out, "NonZeroElems : {n}").ok();
        }
        writeln!(out, "BlockSize : {}", self.block_size).ok();
        writeln!(out, "OptimizedMapping : {}", self.optimized_mapping).ok();
        writeln!(out).ok();
        writeln!(out, "[run_presets]").ok();
        writeln!(out, "InterfaceBandwidth : {}", self.interface_bandwidth).ok();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConfigRecord {
        let preset = Preset::default();
        ConfigRecord {
            run_name: "lws_8x8_1s8".to_string(),
            array: ArrayShape::new(8, 8).unwrap(),
            ifmap_sram_kb: preset.ifmap_sram_kb,
            filter_sram_kb: preset.filter_sram_kb,
            ofmap_sram_kb: preset.ofmap_sram_kb,
            dataflow: preset.dataflow,
            ifmap_offset: preset.ifmap_offset,
            filter_offset: preset.filter_offset,
            ofmap_offset: preset.ofmap_offset,
            memory_banks: preset.memory_banks,
            bandwidth: preset.bandwidth,
            sparsity_support: true,
            sparse_rep: preset.sparse_rep,
            non_zero_elems: Some(1),
            block_size: 8,
            optimized_mapping: true,
            interface_bandwidth: preset.interface_bandwidth,
        }
    }

    #[test]
    fn parse_shape() {
        let shape: ArrayShape = "128x64".parse().unwrap();
        assert_eq!(shape.height, 128);
        assert_eq!(shape.width, 64);
        assert_eq!(shape.to_string(), "128x64");
        assert!("0x4".parse::<ArrayShape>().is_err());
        assert!("4by4".parse::<ArrayShape>().is_err());
    }

    #[test]
    fn render_sections() {
        let text = record().render();
        assert!(text.starts_with("[general]\nrun_name = lws_8x8_1s8\n"));
        assert!(text.contains("ArrayHeight : 8\n"));
        assert!(text.contains("Dataflow : ws\n"));
        assert!(text.contains("SparseRep : ellpack_block\n"));
        assert!(text.contains("NonZeroElems : 1\nBlockSize : 8\n"));
        assert!(text.contains("OptimizedMapping : true\n"));
        assert!(text.ends_with("[run_presets]\nInterfaceBandwidth : USER\n"));
    }

    #[test]
    fn render_without_ratio() {
        let mut record = record();
        record.non_zero_elems = None;
        assert!(!record.render().contains("NonZeroElems"));
        assert_eq!(record.sparsity_ratio(), None);
    }

    #[test]
    fn preset_from_toml() {
        let preset: Preset = toml::from_str(
            r#"
            array = "16x16"
            dataflow = "os"
            sparse_rep = "csr"
            block_size = 4
            interface_bandwidth = "CALC"
            "#,
        )
        .unwrap();
        assert_eq!(preset.array, ArrayShape::new(16, 16).unwrap());
        assert_eq!(preset.dataflow, Dataflow::Os);
        assert_eq!(preset.sparse_rep, SparseRep::Csr);
        assert_eq!(preset.block_size, BlockSizeSetting::Fixed(4));
        assert_eq!(preset.interface_bandwidth, InterfaceBandwidth::Calc);
        assert_eq!(preset.bandwidth, 50);

        let preset: Preset = toml::from_str(r#"block_size = "array_height""#).unwrap();
        assert_eq!(preset.block_size, BlockSizeSetting::ArrayHeight);
        assert_eq!(preset.block_size.resolve(ArrayShape::new(8, 4).unwrap()), 8);
    }
}
