//! Gold CLI: load silver column groups into warehouse tables.

use std::process::ExitCode;

use clap::Parser;

use enem_gold::{Application, CliArgs, Config};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    Application::<Config>::run(&args.config_paths(), enem_gold::run)
}
