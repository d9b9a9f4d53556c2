#![forbid(unsafe_code)]

//! ttv: live topic tail CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("ttv: {e}");
        std::process::exit(e.exit_code());
    }
}
