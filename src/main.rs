//! cellseg CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse args, dispatch to the
//! selected subcommand, and exit with a status code per error kind.
//! For programmatic use, prefer the library API (`cellseg::api`).

use clap::Parser;

mod cli;

fn main() {
    let args = cli::CliArgs::parse();
    if let Err(e) = cli::run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
