use clap::Parser;
use step_engine::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => cli::run::run(args).await,
        Command::Describe(args) => cli::describe::run(args),
        Command::Template(args) => cli::template::run(args),
    }
}
