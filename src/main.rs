use clap::Parser;
use tracing::{debug, error};

use coc::cli::Cli;

/// Determine the log level based on verbosity count
fn get_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize the tracing subscriber with the appropriate settings
fn init_tracing(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(get_log_level(verbose))
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();

    debug!("coc started with verbosity level: {}", verbose);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbosity());

    let exit_code = match cli.execute().await {
        Ok(code) => code,
        Err(err) => {
            error!("Fatal error: {}", err);
            eprintln!("coc: {err}");
            1
        }
    };

    std::process::exit(exit_code);
}
