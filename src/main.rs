use anyhow::Context;
use clap::Parser;

use crossarb::adapter::inbound::cli::command::{CheckCommand, Cli, Commands};
use crossarb::adapter::inbound::cli::{check, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(&args)
            .await
            .with_context(|| format!("run failed ({})", args.config.display())),
        Commands::Check(CheckCommand::Config(arg)) => check::execute_config(&arg.config)
            .with_context(|| format!("invalid configuration {}", arg.config.display())),
    }
}
