//! The experiment space: axes, their cartesian product and the records of each point.

use std::{borrow::Cow, fmt, str::FromStr};

use derive_more::Display;
use enum_as_inner::EnumAsInner;
use eyre::{ensure, eyre, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::sparsity::{self, ScheduleStep, SparsityRatio};

pub mod record;
pub mod workload;

pub use record::{ArrayShape, BlockSizeSetting, ConfigRecord, Preset};
pub use workload::{Layer, Workload, WorkloadDescriptor, WorkloadSpec};

/// the dimensions a sweep can vary
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum AxisKind {
    #[display(fmt = "Array Size")]
    ArraySize,
    #[display(fmt = "On-Chip Memory")]
    Sram,
    #[display(fmt = "Sparsity Ratio")]
    Sparsity,
    #[display(fmt = "Block Size")]
    BlockSize,
    #[display(fmt = "Workload")]
    Workload,
}

impl AxisKind {
    pub const ALL: [AxisKind; 5] = [
        AxisKind::ArraySize,
        AxisKind::Sram,
        AxisKind::Sparsity,
        AxisKind::BlockSize,
        AxisKind::Workload,
    ];
}

impl FromStr for AxisKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AxisKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s.trim())
            .ok_or_else(|| eyre!("unknown axis {s:?}"))
    }
}

/// an on-chip buffer size, kept with the label it was written with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SramSize {
    pub label: String,
    pub kb: u64,
}

impl FromStr for SramSize {
    type Err = eyre::Report;

    /// plain numbers are kB, anything else goes through parse-size with binary units
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let kb = if !label.is_empty() && label.chars().all(|c| c.is_ascii_digit()) {
            label.parse()?
        } else {
            let bytes = parse_size::Config::new()
                .with_binary()
                .parse_size(label)
                .wrap_err_with(|| format!("bad memory size {label:?}"))?;
            ensure!(
                bytes % 1024 == 0,
                "memory size {label:?} is not a whole number of kB"
            );
            bytes / 1024
        };
        ensure!(kb > 0, "memory size {label:?} is empty");
        Ok(Self {
            label: label.to_string(),
            kb,
        })
    }
}

impl TryFrom<String> for SramSize {
    type Error = eyre::Report;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SramSize> for String {
    fn from(value: SramSize) -> Self {
        value.label
    }
}

/// a value of the sparsity axis: a fixed ratio or one step of a ripple schedule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SparsityPoint {
    Ratio(SparsityRatio),
    Step { index: usize, step: ScheduleStep },
}

impl SparsityPoint {
    /// the ratio written into the config file
    pub fn dominant_ratio(&self) -> SparsityRatio {
        match self {
            SparsityPoint::Ratio(ratio) => *ratio,
            SparsityPoint::Step { step, .. } => step.dominant_ratio(),
        }
    }

    /// the ratio of each of `layers` layers
    pub fn layer_ratios(&self, layers: usize) -> Vec<SparsityRatio> {
        match self {
            SparsityPoint::Ratio(ratio) => vec![*ratio; layers],
            SparsityPoint::Step { step, .. } => step.apportion(layers),
        }
    }
}

impl fmt::Display for SparsityPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparsityPoint::Ratio(ratio) => write!(f, "{ratio}"),
            SparsityPoint::Step { index, .. } => write!(f, "step{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum AxisValue {
    ArraySize(ArrayShape),
    Sram(SramSize),
    Sparsity(SparsityPoint),
    BlockSize(u32),
    Workload(Workload),
}

impl AxisValue {
    pub fn kind(&self) -> AxisKind {
        match self {
            AxisValue::ArraySize(_) => AxisKind::ArraySize,
            AxisValue::Sram(_) => AxisKind::Sram,
            AxisValue::Sparsity(_) => AxisKind::Sparsity,
            AxisValue::BlockSize(_) => AxisKind::BlockSize,
            AxisValue::Workload(_) => AxisKind::Workload,
        }
    }

    /// the label used in result keys and tables
    pub fn label(&self) -> String {
        match self {
            AxisValue::ArraySize(shape) => shape.to_string(),
            AxisValue::Sram(size) => size.label.clone(),
            AxisValue::Sparsity(point) => point.to_string(),
            AxisValue::BlockSize(size) => size.to_string(),
            AxisValue::Workload(workload) => workload.name.clone(),
        }
    }
}

/// A sparsity axis whose block size is the height of each point's array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightRatios {
    /// every ratio from `1:h` up to the dense `h:h`
    All,
    /// one value per step of the ripple schedule of `h`
    Schedule { step_size: u32 },
}

impl HeightRatios {
    /// the sparsity values of an array `height` rows high
    pub fn values(&self, height: u32) -> eyre::Result<Vec<AxisValue>> {
        match *self {
            HeightRatios::All => ratio_values(height),
            HeightRatios::Schedule { step_size } => schedule_values(height, step_size),
        }
    }
}

fn ratio_values(m: u32) -> eyre::Result<Vec<AxisValue>> {
    (1..=m)
        .map(|n| Ok(AxisValue::Sparsity(SparsityPoint::Ratio(SparsityRatio::new(n, m)?))))
        .collect()
}

fn schedule_values(m: u32, step_size: u32) -> eyre::Result<Vec<AxisValue>> {
    Ok(sparsity::generate(m, step_size)?
        .into_iter()
        .enumerate()
        .map(|(index, step)| AxisValue::Sparsity(SparsityPoint::Step { index, step }))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AxisValues {
    Fixed(Vec<AxisValue>),
    PerArrayHeight(HeightRatios),
}

/// One named dimension of the sweep with its ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    kind: AxisKind,
    values: AxisValues,
}

impl Axis {
    pub fn new(kind: AxisKind, values: Vec<AxisValue>) -> eyre::Result<Self> {
        ensure!(!values.is_empty(), "axis {kind} has no values");
        if let Some(value) = values.iter().find(|v| v.kind() != kind) {
            return Err(eyre!("axis {kind} holds a {} value", value.kind()));
        }
        let duplicated = values.iter().map(AxisValue::label).duplicates().collect_vec();
        ensure!(
            duplicated.is_empty(),
            "axis {kind} repeats the values {duplicated:?}"
        );
        Ok(Self {
            kind,
            values: AxisValues::Fixed(values),
        })
    }

    pub fn array_sizes(shapes: impl IntoIterator<Item = ArrayShape>) -> eyre::Result<Self> {
        Self::new(
            AxisKind::ArraySize,
            shapes.into_iter().map(AxisValue::ArraySize).collect(),
        )
    }

    pub fn sram_sizes(sizes: impl IntoIterator<Item = SramSize>) -> eyre::Result<Self> {
        Self::new(AxisKind::Sram, sizes.into_iter().map(AxisValue::Sram).collect())
    }

    pub fn sparsity_ratios(ratios: impl IntoIterator<Item = SparsityRatio>) -> eyre::Result<Self> {
        Self::new(
            AxisKind::Sparsity,
            ratios
                .into_iter()
                .map(|r| AxisValue::Sparsity(SparsityPoint::Ratio(r)))
                .collect(),
        )
    }

    /// every ratio from `1:M` up to the dense `M:M`
    pub fn all_ratios(m: u32) -> eyre::Result<Self> {
        Self::new(AxisKind::Sparsity, ratio_values(m)?)
    }

    /// one value per step of the ripple schedule of `m`
    pub fn sparsity_schedule(m: u32, step_size: u32) -> eyre::Result<Self> {
        Self::new(AxisKind::Sparsity, schedule_values(m, step_size)?)
    }

    /// sparsity values resolved per point from the height of its array
    pub fn per_array_height(ratios: HeightRatios) -> eyre::Result<Self> {
        if let HeightRatios::Schedule { step_size } = ratios {
            ensure!(
                step_size > 0 && 100 % step_size == 0,
                "step size {step_size} does not evenly divide 100"
            );
        }
        Ok(Self {
            kind: AxisKind::Sparsity,
            values: AxisValues::PerArrayHeight(ratios),
        })
    }

    pub fn block_sizes(sizes: impl IntoIterator<Item = u32>) -> eyre::Result<Self> {
        let values = sizes
            .into_iter()
            .map(|size| {
                ensure!(size > 0, "block size must be positive");
                Ok(AxisValue::BlockSize(size))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Self::new(AxisKind::BlockSize, values)
    }

    pub fn workloads(workloads: impl IntoIterator<Item = Workload>) -> eyre::Result<Self> {
        let values = workloads
            .into_iter()
            .map(|workload| {
                workload.validate()?;
                Ok(AxisValue::Workload(workload))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Self::new(AxisKind::Workload, values)
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    /// the values of a fixed axis, `None` when they follow the array height
    pub fn values(&self) -> Option<&[AxisValue]> {
        match &self.values {
            AxisValues::Fixed(values) => Some(values),
            AxisValues::PerArrayHeight(_) => None,
        }
    }

    pub fn follows_array_height(&self) -> bool {
        matches!(self.values, AxisValues::PerArrayHeight(_))
    }

    /// the values of this axis at a point built on `array`
    pub fn values_for(&self, array: ArrayShape) -> eyre::Result<Cow<'_, [AxisValue]>> {
        match &self.values {
            AxisValues::Fixed(values) => Ok(Cow::Borrowed(values.as_slice())),
            AxisValues::PerArrayHeight(ratios) => Ok(Cow::Owned(ratios.values(array.height)?)),
        }
    }
}

/// The axis labels of one point, in axis order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey(Vec<(AxisKind, String)>);

impl PointKey {
    pub fn new(entries: Vec<(AxisKind, String)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(AxisKind, String)] {
        &self.0
    }

    pub fn get(&self, kind: AxisKind) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, label)| label.as_str())
    }

    pub fn kinds(&self) -> impl Iterator<Item = AxisKind> + '_ {
        self.0.iter().map(|(kind, _)| *kind)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(_, label)| label.as_str())
    }

    /// the name of the run directory and input files, e.g. `lws_4x4_1s4`
    pub fn run_name(&self, prefix: Option<&str>) -> String {
        prefix
            .into_iter()
            .map(str::to_string)
            .chain(self.0.iter().map(|(kind, label)| match kind {
                AxisKind::BlockSize => format!("b{label}"),
                _ => label.replace(':', "s"),
            }))
            .join("_")
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labels().join(", "))
    }
}

/// everything the runner needs for one point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPoint {
    pub key: PointKey,
    pub config: ConfigRecord,
    pub descriptor: WorkloadDescriptor,
}

/// The cartesian product of a list of axes over a base preset.
#[derive(Debug, Clone)]
pub struct ConfigSpace {
    preset: Preset,
    workload: Workload,
    run_prefix: Option<String>,
    axes: Vec<Axis>,
}

impl ConfigSpace {
    /// `workload` is used by every point unless a workload axis overrides it
    pub fn new(preset: Preset, workload: Workload, axes: Vec<Axis>) -> eyre::Result<Self> {
        ensure!(!axes.is_empty(), "the sweep has no axes");
        let repeated = axes.iter().map(Axis::kind).duplicates().collect_vec();
        ensure!(
            repeated.is_empty(),
            "the axes {repeated:?} appear more than once"
        );
        workload.validate()?;
        let space = Self {
            preset,
            workload,
            run_prefix: None,
            axes,
        };
        if let Some(dependent) = space.axes.iter().position(Axis::follows_array_height) {
            let array_axis = space.axes.iter().position(|a| a.kind == AxisKind::ArraySize);
            if let Some(array_axis) = array_axis {
                ensure!(
                    array_axis < dependent,
                    "the array size axis must come before a sparsity axis that follows the array height"
                );
            }
            for array in space.arrays() {
                space.axes[dependent]
                    .values_for(array)
                    .wrap_err_with(|| format!("no sparsity values for the {array} array"))?;
            }
        }
        Ok(space)
    }

    /// the arrays the points are built on
    fn arrays(&self) -> Vec<ArrayShape> {
        let fixed = self
            .axes
            .iter()
            .find(|axis| axis.kind == AxisKind::ArraySize)
            .and_then(Axis::values);
        match fixed {
            Some(values) => values
                .iter()
                .filter_map(|value| value.as_array_size().copied())
                .collect(),
            None => vec![self.preset.array],
        }
    }

    pub fn with_run_prefix(mut self, prefix: Option<String>) -> Self {
        self.run_prefix = prefix;
        self
    }

    pub fn run_prefix(&self) -> Option<&str> {
        self.run_prefix.as_deref()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// the number of points, the product of the axis lengths summed over the arrays
    pub fn len(&self) -> usize {
        self.arrays()
            .into_iter()
            .map(|array| {
                self.axes
                    .iter()
                    .filter(|axis| axis.kind != AxisKind::ArraySize)
                    .map(|axis| axis.values_for(array).map_or(0, |values| values.len()))
                    .product::<usize>()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily walk every point, the first axis varies slowest.
    pub fn expand(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.walk(0, vec![])
            .map(move |values| self.build_point(&values))
    }

    /// every combination of the axes from `depth` on, each appended to `prefix`
    fn walk<'a>(
        &'a self,
        depth: usize,
        prefix: Vec<Cow<'a, AxisValue>>,
    ) -> Box<dyn Iterator<Item = Vec<Cow<'a, AxisValue>>> + 'a> {
        let Some(axis) = self.axes.get(depth) else {
            return Box::new(std::iter::once(prefix));
        };
        let values: Vec<Cow<'a, AxisValue>> = match &axis.values {
            AxisValues::Fixed(values) => values.iter().map(Cow::Borrowed).collect(),
            AxisValues::PerArrayHeight(ratios) => {
                let array = prefix
                    .iter()
                    .find_map(|value| value.as_array_size().copied())
                    .unwrap_or(self.preset.array);
                // every array was checked in `new`
                ratios
                    .values(array.height)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Cow::Owned)
                    .collect()
            }
        };
        Box::new(values.into_iter().flat_map(move |value| {
            let mut next = prefix.clone();
            next.push(value);
            self.walk(depth + 1, next)
        }))
    }

    fn build_point(&self, values: &[Cow<'_, AxisValue>]) -> SweepPoint {
        let preset = &self.preset;
        let mut array = preset.array;
        let mut sram_kb = None;
        let mut sparsity = None;
        let mut block_size = None;
        let mut workload = &self.workload;
        for value in values {
            match &**value {
                AxisValue::ArraySize(shape) => array = *shape,
                AxisValue::Sram(size) => sram_kb = Some(size.kb),
                AxisValue::Sparsity(point) => sparsity = Some(point),
                AxisValue::BlockSize(size) => block_size = Some(*size),
                AxisValue::Workload(w) => workload = w,
            }
        }

        let dominant = sparsity.map(|point| point.dominant_ratio());
        let block_size = block_size
            .or(dominant.map(|ratio| ratio.m))
            .unwrap_or_else(|| preset.block_size.resolve(array));
        let non_zero_elems = dominant.map(|ratio| ratio.n).or(preset.non_zero_elems);
        let ratios = match sparsity {
            Some(point) => point.layer_ratios(workload.layers.len()),
            None => workload
                .layers
                .iter()
                .map(|layer| {
                    layer.sparsity.unwrap_or(SparsityRatio {
                        n: non_zero_elems.unwrap_or(block_size).min(block_size),
                        m: block_size,
                    })
                })
                .collect(),
        };

        let key = PointKey::new(values.iter().map(|v| (v.kind(), v.label())).collect());
        let config = ConfigRecord {
            run_name: key.run_name(self.run_prefix()),
            array,
            ifmap_sram_kb: sram_kb.unwrap_or(preset.ifmap_sram_kb),
            filter_sram_kb: sram_kb.unwrap_or(preset.filter_sram_kb),
            ofmap_sram_kb: sram_kb.unwrap_or(preset.ofmap_sram_kb),
            dataflow: preset.dataflow,
            ifmap_offset: preset.ifmap_offset,
            filter_offset: preset.filter_offset,
            ofmap_offset: preset.ofmap_offset,
            memory_banks: preset.memory_banks,
            bandwidth: preset.bandwidth,
            sparsity_support: preset.sparsity_support,
            sparse_rep: preset.sparse_rep,
            non_zero_elems,
            block_size,
            optimized_mapping: preset.optimized_mapping,
            interface_bandwidth: preset.interface_bandwidth,
        };
        SweepPoint {
            key,
            config,
            descriptor: WorkloadDescriptor::new(workload, ratios),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn shapes(labels: &[&str]) -> Vec<ArrayShape> {
        labels.iter().map(|l| l.parse().unwrap()).collect()
    }

    fn sram(labels: &[&str]) -> Vec<SramSize> {
        labels.iter().map(|l| l.parse().unwrap()).collect()
    }

    #[test]
    fn sram_labels() {
        let sizes = sram(&["1kb", "256kb", "1mb", "5mb", "64"]);
        let kb = sizes.iter().map(|s| s.kb).collect_vec();
        assert_eq!(kb, vec![1, 256, 1024, 5120, 64]);
        assert_eq!(sizes[2].label, "1mb");
        assert!("1000b".parse::<SramSize>().is_err());
        assert!("0".parse::<SramSize>().is_err());
        assert!("lots".parse::<SramSize>().is_err());
    }

    #[test]
    fn axis_kind_names_round_trip() {
        for kind in AxisKind::ALL {
            assert_eq!(kind.to_string().parse::<AxisKind>().unwrap(), kind);
        }
        assert!("Color".parse::<AxisKind>().is_err());
    }

    #[test]
    fn axis_rejects_bad_values() {
        assert!(Axis::array_sizes(vec![]).is_err());
        assert!(Axis::array_sizes(shapes(&["4x4", "4x4"])).is_err());
        assert!(Axis::new(AxisKind::Sram, vec![AxisValue::BlockSize(4)]).is_err());
        assert!(Axis::block_sizes([4, 0]).is_err());
        assert!(Axis::sparsity_schedule(8, 30).is_err());
    }

    #[test]
    fn space_needs_distinct_axes() {
        let axis = Axis::block_sizes([4, 8]).unwrap();
        assert!(ConfigSpace::new(Preset::default(), Workload::default(), vec![]).is_err());
        assert!(ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![axis.clone(), axis]
        )
        .is_err());
    }

    #[test]
    fn expand_is_the_full_product() {
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["4x4", "8x8", "16x16"])).unwrap(),
                Axis::sram_sizes(sram(&["64kb", "1mb"])).unwrap(),
                Axis::all_ratios(4).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(space.len(), 24);
        let points = space.expand().collect_vec();
        assert_eq!(points.len(), 24);
        let keys: HashSet<_> = points.iter().map(|p| p.key.clone()).collect();
        assert_eq!(keys.len(), 24);
        let names: HashSet<_> = points.iter().map(|p| p.config.run_name.clone()).collect();
        assert_eq!(names.len(), 24);

        // outer axis varies slowest
        let first = points[0].key.labels().collect_vec();
        let second = points[1].key.labels().collect_vec();
        let fifth = points[4].key.labels().collect_vec();
        let ninth = points[8].key.labels().collect_vec();
        assert_eq!(first, vec!["4x4", "64kb", "1:4"]);
        assert_eq!(second, vec!["4x4", "64kb", "2:4"]);
        assert_eq!(fifth, vec!["4x4", "1mb", "1:4"]);
        assert_eq!(ninth, vec!["8x8", "64kb", "1:4"]);
    }

    #[test]
    fn point_records_follow_the_axes() {
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["8x8"])).unwrap(),
                Axis::sram_sizes(sram(&["1mb"])).unwrap(),
                Axis::sparsity_ratios(["2:8".parse().unwrap()]).unwrap(),
            ],
        )
        .unwrap()
        .with_run_prefix(Some("lws".to_string()));
        let point = space.expand().next().unwrap();
        assert_eq!(point.config.run_name, "lws_8x8_1mb_2s8");
        assert_eq!(point.config.array, ArrayShape::new(8, 8).unwrap());
        assert_eq!(point.config.ifmap_sram_kb, 1024);
        assert_eq!(point.config.ofmap_sram_kb, 1024);
        assert_eq!(point.config.non_zero_elems, Some(2));
        assert_eq!(point.config.block_size, 8);
        assert_eq!(
            point.descriptor.render().unwrap(),
            "L,M,N,K,Sparsity,\nL0,256,512,768,2:8,\n"
        );
        assert_eq!(point.key.get(AxisKind::Sram), Some("1mb"));
        assert_eq!(point.key.get(AxisKind::Workload), None);
    }

    #[test]
    fn zero_ratio_point() {
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![Axis::sparsity_ratios(["0:4".parse().unwrap()]).unwrap()],
        )
        .unwrap();
        let point = space.expand().next().unwrap();
        assert_eq!(point.config.run_name, "0s4");
        assert_eq!(point.config.non_zero_elems, Some(0));
        assert_eq!(point.config.block_size, 4);
        assert_eq!(
            point.descriptor.render().unwrap(),
            "L,M,N,K,Sparsity,\nL0,256,512,768,0:4,\n"
        );
    }

    #[test]
    fn block_size_falls_back_to_the_preset() {
        let workload = Workload {
            name: "vit_s".to_string(),
            layers: vec![Layer {
                sparsity: Some("1:4".parse().unwrap()),
                ..Layer::new("L4", 196, 384, 1536)
            }],
        };
        let space = ConfigSpace::new(
            Preset::default(),
            workload,
            vec![Axis::array_sizes(shapes(&["16x16"])).unwrap()],
        )
        .unwrap();
        let point = space.expand().next().unwrap();
        assert_eq!(point.config.block_size, 16);
        assert_eq!(point.config.non_zero_elems, None);
        assert_eq!(point.descriptor.rows[0].1.to_string(), "1:4");

        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["16x16"])).unwrap(),
                Axis::block_sizes([4]).unwrap(),
            ],
        )
        .unwrap();
        let point = space.expand().next().unwrap();
        assert_eq!(point.config.block_size, 4);
        assert_eq!(point.config.run_name, "16x16_b4");
        // no ratio anywhere, so the layer runs dense
        assert_eq!(point.descriptor.rows[0].1.to_string(), "4:4");
    }

    #[test]
    fn schedule_axis_labels_steps() {
        let steps = sparsity::generate(4, 10).unwrap();
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["4x4", "8x8"])).unwrap(),
                Axis::sparsity_schedule(4, 10).unwrap(),
            ],
        )
        .unwrap();
        let points = space.expand().collect_vec();
        assert_eq!(points.len(), 2 * steps.len());
        assert_eq!(points[0].key.get(AxisKind::Sparsity), Some("step0"));
        assert_eq!(points[0].config.non_zero_elems, Some(1));
        assert_eq!(points[0].config.block_size, 4);
        let last = points.last().unwrap();
        assert_eq!(last.key.get(AxisKind::Sparsity), Some("step10"));
        assert_eq!(last.config.non_zero_elems, Some(2));
        assert_eq!(last.config.run_name, "8x8_step10");
    }

    #[test]
    fn ratios_follow_the_array_height() {
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["4x4", "8x8"])).unwrap(),
                Axis::per_array_height(HeightRatios::All).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(space.len(), 4 + 8);
        let points = space.expand().collect_vec();
        assert_eq!(points.len(), 12);
        for point in &points {
            assert_eq!(point.config.block_size, point.config.array.height);
        }
        let labels = points
            .iter()
            .filter_map(|p| p.key.get(AxisKind::Sparsity))
            .collect_vec();
        assert_eq!(labels[..4], ["1:4", "2:4", "3:4", "4:4"]);
        assert_eq!(labels[4], "1:8");
        assert_eq!(labels[11], "8:8");
        assert_eq!(points[11].config.run_name, "8x8_8s8");
        assert_eq!(points[11].config.non_zero_elems, Some(8));
    }

    #[test]
    fn schedule_follows_the_array_height() {
        let space = ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![
                Axis::array_sizes(shapes(&["4x4", "8x8"])).unwrap(),
                Axis::per_array_height(HeightRatios::Schedule { step_size: 10 }).unwrap(),
            ],
        )
        .unwrap();
        let expected = [4, 8]
            .into_iter()
            .map(|m| sparsity::generate(m, 10).unwrap().len())
            .sum::<usize>();
        assert_eq!(space.len(), expected);
        let points = space.expand().collect_vec();
        assert_eq!(points.len(), expected);
        assert!(points.iter().all(|p| p.config.block_size == p.config.array.height));
        assert_eq!(points.last().unwrap().config.non_zero_elems, Some(4));
    }

    #[test]
    fn height_ratios_need_the_array_first() {
        let ratios = Axis::per_array_height(HeightRatios::All).unwrap();
        let arrays = Axis::array_sizes(shapes(&["4x4"])).unwrap();
        assert!(ConfigSpace::new(
            Preset::default(),
            Workload::default(),
            vec![ratios.clone(), arrays]
        )
        .is_err());
        // without an array axis the preset array decides
        let space =
            ConfigSpace::new(Preset::default(), Workload::default(), vec![ratios]).unwrap();
        assert_eq!(space.len(), Preset::default().array.height as usize);
        assert!(Axis::per_array_height(HeightRatios::Schedule { step_size: 30 }).is_err());
    }

    #[test]
    fn schedule_spreads_layers() {
        let workload = Workload {
            name: "four".to_string(),
            layers: (0..4)
                .map(|i| Layer::new(format!("L{i}"), 64, 64, 64))
                .collect(),
        };
        let space = ConfigSpace::new(
            Preset::default(),
            workload,
            vec![Axis::sparsity_schedule(4, 50).unwrap()],
        )
        .unwrap();
        let ratios = space
            .expand()
            .map(|p| {
                p.descriptor
                    .rows
                    .iter()
                    .map(|(_, r)| r.to_string())
                    .join(" ")
            })
            .collect_vec();
        assert_eq!(
            ratios,
            vec!["1:4 1:4 1:4 1:4", "1:4 1:4 2:4 2:4", "2:4 2:4 2:4 2:4"]
        );
    }
}
