use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::lower::LowerArgs;
use cli::needs::NeedsArgs;
use cli::taps::TapsArgs;

#[derive(Parser)]
#[command(
    name = "tapline",
    version,
    about = "Semantic lowering for register-layout circuits"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate execute, lookback, check and validity functions
    Lower(LowerArgs),
    /// Print the tap table and its fingerprint
    Taps(TapsArgs),
    /// Print which components need a lookback function, and why
    Needs(NeedsArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Lower(args) => cli::lower::cmd_lower(args),
        Command::Taps(args) => cli::taps::cmd_taps(args),
        Command::Needs(args) => cli::needs::cmd_needs(args),
    }
}
