//! Main entry point for rowdiff CLI

use clap::Parser;
use rowdiff::cli::Cli;
use rowdiff::commands::execute_command;

/// Exit status: 0 no differences, 1 differences found, 2 trouble.
fn run() -> i32 {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute_command(cli.command, cli.config.as_deref(), &mut out) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) if e.is_stopped() => {
            eprintln!("diff truncated: {}", e);
            2
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

fn main() {
    std::process::exit(run());
}
