//! The sweep file: simulator, paths, stage toggles, base preset and the ordered axes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{bail, WrapErr};
use serde::{Deserialize, Serialize};

use crate::{
    pipeline::PipelineConfig,
    sim::{RunPaths, SimulatorConfig},
    space::{
        ArrayShape, Axis, BlockSizeSetting, ConfigSpace, HeightRatios, Preset, SramSize,
        Workload, WorkloadSpec,
    },
    sparsity::{SparsityRatio, DEFAULT_STEP_SIZE},
};

/// the whole sweep description, read from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// prepended to every run name
    #[serde(default)]
    pub run_prefix: Option<String>,
    /// header of the run name column in the exported table
    #[serde(default = "default_run_column")]
    pub run_column: String,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub base: Preset,
    /// used by every point unless a workload axis is present
    #[serde(default)]
    pub workload: Option<WorkloadSpec>,
    pub axes: Vec<AxisSpec>,
}

fn default_run_column() -> String {
    "Run Name".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub config_dir: PathBuf,
    pub descriptor_dir: PathBuf,
    pub results_dir: PathBuf,
    pub output_csv: PathBuf,
    pub output_json: Option<PathBuf>,
    pub plot: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            config_dir: "configs".into(),
            descriptor_dir: "topologies".into(),
            results_dir: "results".into(),
            output_csv: "output/results.csv".into(),
            output_json: None,
            plot: "output/results.png".into(),
        }
    }
}

impl PathConfig {
    pub fn run_paths(&self) -> eyre::Result<RunPaths> {
        RunPaths::new(&self.config_dir, &self.descriptor_dir, &self.results_dir)
    }
}

/// One `[[axes]]` table, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisSpec {
    ArraySize { values: Vec<ArrayShape> },
    Sram { values: Vec<SramSize> },
    Sparsity(SparsitySpec),
    BlockSize { values: Vec<u32> },
    Workload { values: Vec<WorkloadSpec> },
}

/// Exactly one of `values`, `schedule` or `all_n`.
///
/// The `M` of `schedule` and `all_n` is a number or `"array_height"`, the latter resolved
/// per point from its array.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparsitySpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<SparsityRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_n: Option<BlockSizeSetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub m: BlockSizeSetting,
    #[serde(default = "default_step_size")]
    pub step_size: u32,
}

fn default_step_size() -> u32 {
    DEFAULT_STEP_SIZE
}

impl AxisSpec {
    pub fn build(&self) -> eyre::Result<Axis> {
        match self {
            AxisSpec::ArraySize { values } => Axis::array_sizes(values.iter().copied()),
            AxisSpec::Sram { values } => Axis::sram_sizes(values.iter().cloned()),
            AxisSpec::Sparsity(spec) => spec.build(),
            AxisSpec::BlockSize { values } => Axis::block_sizes(values.iter().copied()),
            AxisSpec::Workload { values } => {
                let workloads = values
                    .iter()
                    .map(WorkloadSpec::resolve)
                    .collect::<eyre::Result<Vec<_>>>()?;
                Axis::workloads(workloads)
            }
        }
    }
}

impl SparsitySpec {
    fn build(&self) -> eyre::Result<Axis> {
        match (self.values.is_empty(), self.schedule, self.all_n) {
            (false, None, None) => Axis::sparsity_ratios(self.values.iter().copied()),
            (true, Some(ScheduleSpec { m, step_size }), None) => match m {
                BlockSizeSetting::Fixed(m) => Axis::sparsity_schedule(m, step_size),
                BlockSizeSetting::ArrayHeight => {
                    Axis::per_array_height(HeightRatios::Schedule { step_size })
                }
            },
            (true, None, Some(BlockSizeSetting::Fixed(m))) => Axis::all_ratios(m),
            (true, None, Some(BlockSizeSetting::ArrayHeight)) => {
                Axis::per_array_height(HeightRatios::All)
            }
            _ => bail!("a sparsity axis needs exactly one of values, schedule or all_n"),
        }
    }
}

impl SweepConfig {
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).wrap_err_with(|| format!("cannot read sweep file {path:?}"))?;
        toml::from_str(&text).wrap_err_with(|| format!("cannot parse sweep file {path:?}"))
    }

    /// Build the experiment space, every configuration error surfaces here before any run.
    pub fn build_space(&self) -> eyre::Result<ConfigSpace> {
        let workload = match &self.workload {
            Some(spec) => spec.resolve()?,
            None => Workload::default(),
        };
        let axes = self
            .axes
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                spec.build()
                    .wrap_err_with(|| format!("bad axis #{} in the sweep file", index + 1))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(ConfigSpace::new(self.base.clone(), workload, axes)?
            .with_run_prefix(self.run_prefix.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::space::AxisKind;

    const LWS: &str = r#"
run_prefix = "lws"
run_column = "LWS"

[simulator]
program = "python3"
args = ["scalesim/scale.py"]
timeout = "45m"

[paths]
results_dir = "results/lws"

[pipeline]
plot = true

[base]
bandwidth = 100

[[axes]]
kind = "array_size"
values = ["4x4", "8x8", "16x16"]

[[axes]]
kind = "sparsity"
schedule = { m = 4 }
"#;

    #[test]
    fn parse_layer_wise_sweep() {
        let config: SweepConfig = toml::from_str(LWS).unwrap();
        assert_eq!(config.run_column, "LWS");
        assert_eq!(config.simulator.timeout, Duration::from_secs(45 * 60));
        assert_eq!(config.paths.results_dir, PathBuf::from("results/lws"));
        assert_eq!(config.paths.config_dir, PathBuf::from("configs"));
        assert!(config.pipeline.generate && config.pipeline.execute && config.pipeline.plot);
        assert_eq!(config.base.bandwidth, 100);
        assert_eq!(
            config.axes[1],
            AxisSpec::Sparsity(SparsitySpec {
                schedule: Some(ScheduleSpec {
                    m: BlockSizeSetting::Fixed(4),
                    step_size: DEFAULT_STEP_SIZE
                }),
                ..Default::default()
            })
        );

        let space = config.build_space().unwrap();
        assert_eq!(space.len(), 3 * 11);
        let kinds: Vec<_> = space.axes().iter().map(Axis::kind).collect();
        assert_eq!(kinds, vec![AxisKind::ArraySize, AxisKind::Sparsity]);
        let first = space.expand().next().unwrap();
        assert_eq!(first.config.run_name, "lws_4x4_step0");
        assert_eq!(first.config.bandwidth, 100);
    }

    #[test]
    fn every_axis_kind() {
        let config: SweepConfig = toml::from_str(
            r#"
            [[axes]]
            kind = "sram"
            values = ["1kb", "1mb"]

            [[axes]]
            kind = "sparsity"
            all_n = 4

            [[axes]]
            kind = "block_size"
            values = [4, 8]

            [[axes]]
            kind = "workload"
            values = [
                { name = "vit_s", layers = [{ name = "L4", m = 196, n = 384, k = 1536 }] },
                { name = "vit_b", layers = [{ name = "L4", m = 196, n = 768, k = 3072 }] },
            ]
            "#,
        )
        .unwrap();
        let space = config.build_space().unwrap();
        assert_eq!(space.len(), 2 * 4 * 2 * 2);
    }

    #[test]
    fn ratios_per_array_height() {
        let config: SweepConfig = toml::from_str(
            r#"
            [[axes]]
            kind = "array_size"
            values = ["4x4", "8x8"]

            [[axes]]
            kind = "sparsity"
            all_n = "array_height"
            "#,
        )
        .unwrap();
        let space = config.build_space().unwrap();
        assert_eq!(space.len(), 4 + 8);
        let points: Vec<_> = space.expand().collect();
        assert_eq!(points.len(), 12);
        assert!(points
            .iter()
            .all(|p| p.config.block_size == p.config.array.height));

        let config: SweepConfig = toml::from_str(
            r#"
            [[axes]]
            kind = "array_size"
            values = ["4x4", "8x8"]

            [[axes]]
            kind = "sparsity"
            schedule = { m = "array_height", step_size = 50 }
            "#,
        )
        .unwrap();
        // 4 has ratios 1:4 and 2:4, 8 has four ratios
        assert_eq!(config.build_space().unwrap().len(), 3 + 7);
        assert!(toml::from_str::<SweepConfig>(
            r#"
            [[axes]]
            kind = "sparsity"
            all_n = "array_width"
            "#
        )
        .is_err());
    }

    #[test]
    fn configuration_errors_surface_before_the_sweep() {
        let bad = |text: &str| {
            let config: SweepConfig = toml::from_str(text).unwrap();
            config.build_space().is_err()
        };
        assert!(bad("axes = []"));
        assert!(bad(
            r#"
            [[axes]]
            kind = "sparsity"
            schedule = { m = 8, step_size = 30 }
            "#
        ));
        assert!(bad(
            r#"
            [[axes]]
            kind = "sparsity"
            values = ["1:4"]
            all_n = 4
            "#
        ));
        assert!(bad(
            r#"
            [[axes]]
            kind = "array_size"
            values = []
            "#
        ));

        assert!(toml::from_str::<SweepConfig>(
            r#"
            [[axes]]
            kind = "array_size"
            values = ["4by4"]
            "#
        )
        .is_err());
        assert!(toml::from_str::<SweepConfig>("unknown = 1\naxes = []").is_err());
    }

    #[test]
    fn bundled_sweep_files() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("sweeps");
        let expected = [("lws", 4 + 8 + 16 + 32), ("arch", 9 * 4), ("vit", 4 * 3)];
        for (name, len) in expected {
            let config = SweepConfig::load(dir.join(format!("{name}.toml"))).unwrap();
            assert_eq!(config.build_space().unwrap().len(), len, "{name}");
        }
    }

    #[test]
    fn load_names_the_file() {
        let err = SweepConfig::load("does/not/exist.toml").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.toml"));
    }
}
