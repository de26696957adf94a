use std::process::ExitCode;

use clap::Parser;
use wandfe::cli::{self, CliArgs};

fn main() -> ExitCode {
    cli::run(CliArgs::parse())
}
