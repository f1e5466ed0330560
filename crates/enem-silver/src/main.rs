//! Silver CLI: transform bronze shards into column-group Parquet files.

use std::process::ExitCode;

use clap::Parser;

use enem_silver::{Application, CliArgs, Config};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    Application::<Config>::run(&args.config_paths(), enem_silver::run)
}
