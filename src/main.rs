use std::process::ExitCode;

use clap::Parser;
use users_api::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.resolved_command() {
        Command::Serve => cli::serve::run().await,
        Command::Migrate => cli::migrate::run().await.map(|()| ExitCode::SUCCESS),
    }
}
