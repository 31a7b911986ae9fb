mod cli;
mod diagnostics;
mod error;
mod manifest;
mod registry;
mod resolver;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;
use colored::Colorize;
use std::process;
use workflow::UpdateRequest;

fn main() {
    let cli = Cli::parse();

    let request = UpdateRequest {
        file_path: &cli.file_path,
        selector: cli.command.selector(),
        policy: &cli.policy,
        keep_range: cli.keep_range,
        registry: &cli.registry,
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    if let Err(e) = workflow::execute_update(&request) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
