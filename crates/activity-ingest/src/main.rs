use anyhow::Result;
use clap::Parser;

use activity_ingest::bootstrap::init_tracing;
use activity_ingest::cli_args::Cli;
use activity_ingest::cli_commands::execute_command;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    execute_command(cli.command).await
}
