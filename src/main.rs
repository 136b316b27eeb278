use clap::Parser;
use riskpulse::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
