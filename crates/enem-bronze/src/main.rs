//! Bronze CLI: upload raw files, or split the microdata CSV into shards.

use std::process::ExitCode;

use clap::Parser;

use enem_bronze::{Application, Command, ConfigArgs, Config};

#[derive(Parser, Debug)]
#[command(version, about = "Ingest ENEM source files into the bronze tier")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command;
    Application::<Config>::run(&cli.config.config_paths(), move |config| {
        enem_bronze::run(config, command)
    })
}
