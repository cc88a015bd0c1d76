use anyhow::Result;
use clap::Parser;

mod cli;
mod logging;
mod run_cmd;
mod setup_cmds;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.debug)?;

    match cli.command {
        Commands::Run(args) => run_cmd::execute(args, cli.config).await,
        Commands::Init { force } => setup_cmds::init(cli.config, force),
        Commands::Doctor => setup_cmds::doctor(cli.config).await,
        Commands::Forget => setup_cmds::forget(),
    }
}
