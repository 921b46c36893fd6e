//! Driving the external simulator for one sweep point.
//!
//! Every point gets its own config file and workload descriptor on disk, then the simulator is
//! started once with a deadline. Whatever goes wrong with the child is turned into a
//! [`RunOutcome`] so the sweep keeps going.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use enum_as_inner::EnumAsInner;
use eyre::WrapErr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::space::{ConfigRecord, WorkloadDescriptor};

pub mod metric;
pub mod process;
pub mod report;

pub use metric::{extract_metric, MarkerExtractor, MetricExtractor, COMPUTE_CYCLES_MARKER};
pub use process::{run_with_timeout, ProcessError, ProcessOutput};
pub use report::{read_compute_report, LayerCycles, COMPUTE_REPORT};

/// how to start the simulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    pub program: PathBuf,
    /// arguments placed before the generated ones
    pub args: Vec<String>,
    /// pass `-i gemm` so the descriptor is read as GEMM shapes
    pub gemm: bool,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
    pub marker: String,
    pub working_dir: Option<PathBuf>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["scalesim/scale.py".to_string()],
            gemm: true,
            timeout: Duration::from_secs(30 * 60),
            marker: COMPUTE_CYCLES_MARKER.to_string(),
            working_dir: None,
        }
    }
}

fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

/// where the inputs and reports of the runs live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub config_dir: PathBuf,
    pub descriptor_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl RunPaths {
    /// relative directories are anchored at the current directory, the simulator may run
    /// somewhere else
    pub fn new(
        config_dir: impl AsRef<Path>,
        descriptor_dir: impl AsRef<Path>,
        results_dir: impl AsRef<Path>,
    ) -> eyre::Result<Self> {
        let cwd = env::current_dir().wrap_err("cannot read the current directory")?;
        Ok(Self {
            config_dir: cwd.join(config_dir),
            descriptor_dir: cwd.join(descriptor_dir),
            results_dir: cwd.join(results_dir),
        })
    }

    pub fn config_file(&self, run_name: &str) -> PathBuf {
        self.config_dir.join(format!("{run_name}.cfg"))
    }

    pub fn descriptor_file(&self, run_name: &str) -> PathBuf {
        self.descriptor_dir.join(format!("{run_name}.csv"))
    }

    pub fn report_file(&self, run_name: &str) -> PathBuf {
        self.results_dir.join(run_name).join(COMPUTE_REPORT)
    }
}

/// how a single run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumAsInner)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Cycles(u64),
    MetricNotFound,
    Failed { reason: String },
    TimedOut { after_secs: u64 },
}

impl RunOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Cycles(_) => "ok",
            RunOutcome::MetricNotFound => "metric_not_found",
            RunOutcome::Failed { .. } => "failed",
            RunOutcome::TimedOut { .. } => "timed_out",
        }
    }

    /// rebuild an outcome from an exported status column, failure details are not exported
    pub fn from_status(status: &str, cycles: Option<u64>) -> eyre::Result<Self> {
        Ok(match (status, cycles) {
            ("ok", Some(cycles)) => RunOutcome::Cycles(cycles),
            ("ok", None) => eyre::bail!("status ok without a cycle count"),
            ("metric_not_found", _) => RunOutcome::MetricNotFound,
            ("failed", _) => RunOutcome::Failed {
                reason: String::new(),
            },
            ("timed_out", _) => RunOutcome::TimedOut { after_secs: 0 },
            (other, _) => eyre::bail!("unknown run status {other:?}"),
        })
    }
}

/// the result of one point, the cycle count plus the per-layer breakdown when a report exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    #[serde(default)]
    pub layers: Vec<LayerCycles>,
}

impl RunResult {
    pub fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            layers: vec![],
        }
    }

    pub fn cycles(&self) -> Option<u64> {
        self.outcome.as_cycles().copied()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_cycles()
    }
}

impl From<RunOutcome> for RunResult {
    fn from(outcome: RunOutcome) -> Self {
        Self::new(outcome)
    }
}

/// Runs the simulator, one point at a time.
#[derive(Debug, Clone)]
pub struct SimulationRunner<E = MarkerExtractor> {
    simulator: SimulatorConfig,
    paths: RunPaths,
    extractor: E,
}

impl SimulationRunner {
    pub fn new(simulator: SimulatorConfig, paths: RunPaths) -> eyre::Result<Self> {
        let extractor = MarkerExtractor::new(&simulator.marker)?;
        Ok(Self::with_extractor(simulator, paths, extractor))
    }
}

impl<E: MetricExtractor> SimulationRunner<E> {
    pub fn with_extractor(simulator: SimulatorConfig, paths: RunPaths, extractor: E) -> Self {
        Self {
            simulator,
            paths,
            extractor,
        }
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    pub fn simulator(&self) -> &SimulatorConfig {
        &self.simulator
    }

    /// write the config file and the descriptor of a run, returning their paths
    pub fn write_inputs(
        &self,
        config: &ConfigRecord,
        descriptor: &WorkloadDescriptor,
    ) -> eyre::Result<(PathBuf, PathBuf)> {
        let run_name = &config.run_name;
        let config_file = self.paths.config_file(run_name);
        let descriptor_file = self.paths.descriptor_file(run_name);
        for dir in [&self.paths.config_dir, &self.paths.descriptor_dir] {
            fs::create_dir_all(dir).wrap_err_with(|| format!("cannot create {dir:?}"))?;
        }
        fs::write(&config_file, config.render())
            .wrap_err_with(|| format!("cannot write {config_file:?}"))?;
        fs::write(&descriptor_file, descriptor.render()?)
            .wrap_err_with(|| format!("cannot write {descriptor_file:?}"))?;
        Ok((config_file, descriptor_file))
    }

    /// the command line of one run, `<program> [args] -c <cfg> -t <descriptor> -p <results>`
    pub fn command(&self, config_file: &Path, descriptor_file: &Path) -> Command {
        let mut command = Command::new(&self.simulator.program);
        command
            .args(&self.simulator.args)
            .arg("-c")
            .arg(config_file)
            .arg("-t")
            .arg(descriptor_file)
            .arg("-p")
            .arg(&self.paths.results_dir);
        if self.simulator.gemm {
            command.args(["-i", "gemm"]);
        }
        if let Some(dir) = &self.simulator.working_dir {
            command.current_dir(dir);
        }
        command
    }

    /// run the simulator on inputs already on disk
    pub fn execute(&self, run_name: &str, config_file: &Path, descriptor_file: &Path) -> RunResult {
        let mut command = self.command(config_file, descriptor_file);
        debug!("{run_name}: {command:?}");
        let outcome = match run_with_timeout(&mut command, self.simulator.timeout) {
            Err(ProcessError::TimedOut(after)) => {
                warn!("{run_name}: the simulator was killed after {after:?}");
                RunOutcome::TimedOut {
                    after_secs: after.as_secs(),
                }
            }
            Err(e) => {
                warn!("{run_name}: {e}");
                RunOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Ok(output) if !output.status.success() => {
                warn!(
                    "{run_name}: the simulator exited with {}, stderr:\n{}",
                    output.status,
                    output.stderr.trim_end()
                );
                RunOutcome::Failed {
                    reason: output.status.to_string(),
                }
            }
            Ok(output) => match self.extractor.extract(&output.stdout) {
                Some(cycles) => {
                    info!("{run_name}: {cycles} cycles in {:?}", output.elapsed);
                    RunOutcome::Cycles(cycles)
                }
                None => {
                    warn!(
                        "{run_name}: no {:?} in the simulator output",
                        self.simulator.marker
                    );
                    RunOutcome::MetricNotFound
                }
            },
        };

        let mut result = RunResult::new(outcome);
        if result.is_success() {
            let report = self.paths.report_file(run_name);
            match read_compute_report(&report) {
                Ok(layers) => result.layers = layers,
                Err(e) => warn!("{run_name}: no per-layer cycles: {e:#}"),
            }
        }
        result
    }

    /// write the inputs of a point and run it
    pub fn run(&self, config: &ConfigRecord, descriptor: &WorkloadDescriptor) -> RunResult {
        match self.write_inputs(config, descriptor) {
            Ok((config_file, descriptor_file)) => {
                self.execute(&config.run_name, &config_file, &descriptor_file)
            }
            Err(e) => {
                warn!("{}: cannot write the inputs: {e:#}", config.run_name);
                RunOutcome::Failed {
                    reason: format!("{e:#}"),
                }
                .into()
            }
        }
    }
}
