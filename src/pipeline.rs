//! The sweep stages and the function that strings them together.

use std::path::Path;

use eyre::{bail, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    analysis::{stats::get_mean_std_max_from_iter, ResultAggregator, ResultTable},
    config::{PathConfig, SweepConfig},
    draw::{self, CyclesDrawer},
    sim::{MetricExtractor, RunOutcome, RunResult, SimulationRunner},
    space::{ConfigSpace, SweepPoint},
};

/// which stages of the pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// write the config files and descriptors of every point
    pub generate: bool,
    /// run the simulator on every point
    pub execute: bool,
    /// draw the results table
    pub plot: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generate: true,
            execute: true,
            plot: false,
        }
    }
}

/// runs a point whose inputs are already on disk
pub trait PointRunner {
    fn run_point(&mut self, point: &SweepPoint) -> RunResult;
}

impl<E: MetricExtractor> PointRunner for SimulationRunner<E> {
    fn run_point(&mut self, point: &SweepPoint) -> RunResult {
        let run_name = &point.config.run_name;
        let config_file = self.paths().config_file(run_name);
        let descriptor_file = self.paths().descriptor_file(run_name);
        if !config_file.is_file() || !descriptor_file.is_file() {
            warn!("{run_name}: inputs are missing, generate them first");
            return RunOutcome::Failed {
                reason: "missing inputs".to_string(),
            }
            .into();
        }
        self.execute(run_name, &config_file, &descriptor_file)
    }
}

/// write the inputs of every point, returns how many were written
pub fn generate<E: MetricExtractor>(
    space: &ConfigSpace,
    runner: &SimulationRunner<E>,
) -> eyre::Result<usize> {
    let mut written = 0;
    for point in space.expand() {
        runner
            .write_inputs(&point.config, &point.descriptor)
            .wrap_err_with(|| format!("cannot generate the inputs of {}", point.key))?;
        written += 1;
    }
    info!(
        "generated {written} configs in {:?}",
        runner.paths().config_dir
    );
    Ok(written)
}

/// run every point in order, a failing point never stops the sweep
pub fn sweep(
    space: &ConfigSpace,
    runner: &mut impl PointRunner,
    run_column: &str,
) -> ResultAggregator {
    let total = space.len();
    let mut aggregator = ResultAggregator::new(
        run_column,
        space.run_prefix().map(str::to_string),
        space.axes().iter().map(|axis| axis.kind()).collect(),
    );
    for (index, point) in space.expand().enumerate() {
        info!("[{}/{total}] {}", index + 1, point.key);
        let result = runner.run_point(&point);
        aggregator.record(point.key, result);
    }
    let table = aggregator.export();
    let cycles = table.rows().into_iter().filter_map(|(_, r)| r.cycles());
    match get_mean_std_max_from_iter(cycles.collect::<Vec<_>>()) {
        Some(summary) => info!(
            "{} points, {} failed, cycles mean {:.1} std {:.1} max {}",
            table.len(),
            table.failures(),
            summary.mean,
            summary.std,
            summary.max
        ),
        None => warn!("none of the {} points produced a cycle count", table.len()),
    }
    aggregator
}

/// write the CSV and, when configured, the JSON export
pub fn persist(table: &ResultTable, paths: &PathConfig) -> eyre::Result<()> {
    table.save_csv(&paths.output_csv)?;
    info!("results written to {:?}", paths.output_csv);
    if let Some(json) = &paths.output_json {
        table.save_json(json)?;
        info!("results written to {json:?}");
    }
    Ok(())
}

pub fn plot(table: &ResultTable, output: &Path) -> eyre::Result<()> {
    draw::draw_data::<_, CyclesDrawer>(output, table)
}

/// Run the stages enabled in the sweep file, returns the table when there is one.
pub fn run_pipeline(config: &SweepConfig) -> eyre::Result<Option<ResultTable>> {
    let space = config.build_space()?;
    let stages = config.pipeline;
    info!(
        "sweep of {} points over {} axes, stages {stages:?}",
        space.len(),
        space.axes().len()
    );
    let mut runner = SimulationRunner::new(config.simulator.clone(), config.paths.run_paths()?)?;

    if stages.generate {
        generate(&space, &runner)?;
    }
    let table = if stages.execute {
        let table = sweep(&space, &mut runner, &config.run_column).into_table();
        persist(&table, &config.paths)?;
        Some(table)
    } else if stages.plot {
        let csv = &config.paths.output_csv;
        if !csv.is_file() {
            bail!("nothing to plot, {csv:?} does not exist and execution is disabled");
        }
        Some(ResultTable::load_csv(csv)?)
    } else {
        None
    };
    if stages.plot {
        if let Some(table) = &table {
            plot(table, &config.paths.plot)?;
        }
    }
    Ok(table)
}
