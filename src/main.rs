use std::process::ExitCode;

use clap::Parser;

use paintfe_heal::cli::{self, CliArgs};
use paintfe_heal::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Logger first so argument handling and worker startup are captured.
    match &args.log_file {
        Some(path) => logger::init_at(path.clone()),
        None => logger::init(),
    }

    cli::run(args)
}
