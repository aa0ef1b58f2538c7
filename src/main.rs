//! Proberig CLI — provisions kernel-instrumentation test environments.

use clap::Parser;

fn main() {
    let cli = proberig::cli::Cli::parse();
    if let Err(e) = proberig::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
