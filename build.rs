use std::ffi::OsString;

use clap::Command;
use clap::CommandFactory;
use clap_complete::{Generator, Shell};
#[path = "src/cli.rs"]
mod cli;

const OUT_DIR: &str = "completion_scripts";

fn print_completions<G: Generator>(gen: G, cmd: &mut Command, outdir: impl Into<OsString>) {
    clap_complete::generate_to(gen, cmd, cmd.get_name().to_string(), outdir).unwrap();
}
fn generate_complete_scripts(cmd: &mut Command) {
    std::fs::create_dir_all(OUT_DIR).unwrap();
    print_completions(Shell::Zsh, cmd, OUT_DIR);
    print_completions(Shell::Bash, cmd, OUT_DIR);
    print_completions(Shell::Fish, cmd, OUT_DIR);
    print_completions(Shell::PowerShell, cmd, OUT_DIR);
    print_completions(Shell::Elvish, cmd, OUT_DIR);
}

fn main() {
    println!("cargo:rerun-if-changed=src/cli.rs");
    let mut cmd = cli::Cli::command().name("nm_sweep");
    generate_complete_scripts(&mut cmd);
}
