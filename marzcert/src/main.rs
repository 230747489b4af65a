mod cli;
mod commands;
mod output;
mod paths;
mod system;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    crate::output::set_verbose(cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cli.verbose {
                EnvFilter::new("info")
            } else {
                EnvFilter::new("warn")
            }
        }))
        .with_target(false)
        .init();

    // certbot and the installers run in the foreground; an interrupt ends the run.
    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!();
        crate::output::error_stderr("Interrupted");
        std::process::exit(130);
    }) {
        tracing::debug!(error = %e, "Failed to install Ctrl-C handler");
    }

    if let Err(e) = cli.run() {
        crate::output::error_stderr(&e.to_string());
        std::process::exit(1);
    }
}
