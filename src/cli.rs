//! The command line interface of the sweep driver.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// drive an N:M sparse accelerator simulator across an experiment space
#[derive(Parser, Debug)]
#[command(author, about, version)]
pub struct Cli {
    /// subcommand
    #[clap(subcommand)]
    pub subcmd: Operation,
}

/// the subcommands of the sweep driver
#[derive(Debug, Subcommand)]
pub enum Operation {
    /// run the stages described by a sweep file
    Sweep(SweepArgs),
    /// print the ripple schedule of a block size
    Schedule(ScheduleArgs),
    /// estimate the storage of a compressed matrix
    Storage(StorageArgs),
    /// summarize the compute reports under a results directory
    Report(ReportArgs),
    /// draw an exported results table
    Draw(DrawArgs),
}

/// the arguments of the sweep subcommand
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// the sweep file path
    pub config: PathBuf,
    /// do not write the config files and descriptors
    #[arg(long)]
    pub skip_generate: bool,
    /// do not run the simulator
    #[arg(long)]
    pub skip_execute: bool,
    /// draw the results after the sweep
    #[arg(long)]
    pub plot: bool,
    /// override the simulator timeout, e.g. "10m"
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// the block size M
    #[arg(short, long)]
    pub m: u32,
    /// percent moved per step, must divide 100
    #[arg(short, long, default_value_t = 10)]
    pub step_size: u32,
}

#[derive(Debug, Args)]
pub struct StorageArgs {
    pub rows: u64,
    pub cols: u64,
    pub compressed_rows: u64,
    pub compressed_cols: u64,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// the directory holding one sub directory per run
    pub results: PathBuf,
    /// a TOML file of [[groups]] to sum layers into
    #[arg(short, long)]
    pub groups: Option<PathBuf>,
    /// sum layers into the stages of ResNet-18
    #[arg(long, conflicts_with = "groups")]
    pub resnet18: bool,
}

#[derive(Debug, Args)]
pub struct DrawArgs {
    /// the results table exported by a sweep
    pub results: PathBuf,
    /// the output path, png or svg
    pub output: PathBuf,
}
