use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "snipe",
    version,
    about = "Polls contended course sections and registers the moment a seat opens"
)]
pub struct Cli {
    /// Path to snipe.toml (defaults to ./snipe.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose (debug) logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the configured sections and register as seats open
    Run(RunArgs),

    /// Write a starter snipe.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Check that the WebDriver endpoint is reachable
    Doctor,

    /// Forget stored credentials and 2FA cookies
    Forget,
}

#[derive(Args)]
pub struct RunArgs {
    /// Login username (prompted when omitted)
    #[arg(long)]
    pub username: Option<String>,
}
