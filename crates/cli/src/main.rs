use anyhow::Context;
use clap::Parser;
use head_scan_cli::args::Args;
use head_scan_cli::{Outcome, logging, presentation};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    logging::initialize(logging::level_for(args.verbose, args.quiet));

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: &Args) -> anyhow::Result<()> {
    match head_scan_cli::run(args).context("scan failed")? {
        Outcome::TemplateWritten(path) => {
            println!("Settings file not found. A template was written to {}", path.display());
            println!("Fill in the roots and run again.");
        }
        Outcome::Completed(report) => presentation::print_summary(&report),
    }
    Ok(())
}
