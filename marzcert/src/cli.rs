use clap::{Parser, Subcommand};

use crate::commands::{self, install, menu, update};

/// marzcert - Let's Encrypt certificates for Marzneshin panels and nodes
#[derive(Parser)]
#[command(name = "marzcert")]
#[command(version, disable_version_flag = true)]
#[command(about = "Issue DNS-validated certificates and distribute them to Marzneshin and Marznode")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Show version
    #[arg(long, global = true)]
    pub version: bool,

    /// Show verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install Marzneshin, issue a certificate and enable panel TLS
    Install,
    /// Reissue certificates and copy them to their destinations
    #[command(visible_aliases = ["renew", "reissue"])]
    Update,
}

impl Cli {
    pub fn run(self) -> commands::CommandResult {
        if self.version {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        match self.command {
            None => menu::run(),
            Some(Commands::Install) => install::run(),
            Some(Commands::Update) => update::run(),
        }
    }
}
