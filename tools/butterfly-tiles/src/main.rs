//! # Butterfly-tiles CLI
//!
//! Command-line interface for the butterfly-tiles library.

use clap::Parser;

mod cli;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = cli.run() {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}
