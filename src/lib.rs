//! Drive an N:M sparse systolic-array simulator across an experiment space
// #![deny(unsafe_code)]
// #![warn(missing_docs)]
pub mod analysis;
pub mod cli;
pub mod config;
pub mod draw;
pub mod pipeline;
pub mod sim;
pub mod space;
pub mod sparsity;

use std::{ffi::OsString, io};

use clap::Parser;
use cli::{Cli, DrawArgs, ReportArgs, ScheduleArgs, StorageArgs, SweepArgs};
use eyre::{Result, WrapErr};
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::fmt::{writer::MakeWriterExt, MakeWriter};

pub use analysis::{ResultAggregator, ResultTable};
pub use config::SweepConfig;
pub use pipeline::run_pipeline;
pub use sim::SimulationRunner;
pub use space::ConfigSpace;

pub fn init_logger_info() {
    init_logger_with_ansi(LevelFilter::INFO, io::stderr, true);
}

/// the default level can be overridden with `RUST_LOG`
pub fn init_logger_with_ansi(
    filter: LevelFilter,
    writter: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
    ansi: bool,
) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .with_writer(writter)
        .with_ansi(ansi)
        .try_init()
        .unwrap_or_else(|e| {
            eprintln!("failed to init logger: {}", e);
        });
}

pub fn init_logger(
    filter: LevelFilter,
    writter: impl for<'writer> MakeWriter<'writer> + 'static + Send + Sync,
) {
    init_logger_with_ansi(filter, writter, false);
}

fn sweep(args: SweepArgs) -> Result<()> {
    let SweepArgs {
        config: path,
        skip_generate,
        skip_execute,
        plot,
        timeout,
    } = args;
    let mut config = SweepConfig::load(&path)?;
    config.pipeline.generate &= !skip_generate;
    config.pipeline.execute &= !skip_execute;
    config.pipeline.plot |= plot;
    if let Some(timeout) = timeout {
        config.simulator.timeout = humantime::parse_duration(&timeout)
            .wrap_err_with(|| format!("bad timeout {timeout:?}"))?;
    }
    info!("sweep with config: {:?}", path);
    let current_time = std::time::Instant::now();
    if let Some(table) = run_pipeline(&config)? {
        println!(
            "{} points, {} failed, results in {:?}",
            table.len(),
            table.failures(),
            config.paths.output_csv
        );
    }
    info!("time elapsed: {:?}", current_time.elapsed());
    Ok(())
}

fn report(args: ReportArgs) -> Result<()> {
    let groups = match (&args.groups, args.resnet18) {
        (Some(path), _) => Some(analysis::LayerGroups::load(path)?),
        (None, true) => Some(analysis::LayerGroups::default()),
        (None, false) => None,
    };
    let reports = analysis::scan_reports(&args.results)?;
    info!("found {} compute reports in {:?}", reports.len(), args.results);
    for report in &reports {
        println!("{}\t{}", report.run_name, report.total_cycles());
        let Some(groups) = &groups else {
            continue;
        };
        let (sums, summary) = report.grouped(groups);
        for (name, cycles) in sums {
            println!("  {name}\t{cycles}");
        }
        if let Some(summary) = summary {
            println!(
                "  mean {:.1}\tstd {:.1}\tmax {}",
                summary.mean, summary.std, summary.max
            );
        }
    }
    Ok(())
}

/// the main function of the sweep driver
pub fn main_inner<A, T>(args: A) -> Result<()>
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.subcmd {
        cli::Operation::Sweep(args) => {
            let file_appender = tracing_appender::rolling::hourly("output/", "nm_sweep.log");
            let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
            init_logger(LevelFilter::INFO, io::stderr.and(non_blocking));
            sweep(args)?;
        }
        cli::Operation::Schedule(ScheduleArgs { m, step_size }) => {
            let steps = sparsity::generate(m, step_size)?;
            print!("{}", sparsity::schedule::format_table(&steps));
        }
        cli::Operation::Storage(StorageArgs {
            rows,
            cols,
            compressed_rows,
            compressed_cols,
        }) => {
            let cost = sparsity::estimate(rows, cols, compressed_rows, compressed_cols);
            println!("original words:   {}", cost.original_words);
            println!("metadata words:   {}", cost.metadata_words);
            println!("compressed words: {}", cost.compressed_words);
            println!(
                "ratio: {:.4}, beneficial: {}",
                cost.ratio(),
                cost.is_beneficial()
            );
        }
        cli::Operation::Report(args) => {
            init_logger_info();
            report(args)?;
        }
        cli::Operation::Draw(DrawArgs { results, output }) => {
            init_logger_info();
            let table = ResultTable::load_csv(&results)?;
            pipeline::plot(&table, &output)?;
        }
    }
    Ok(())
}
