//! CLI module for the step engine
//!
//! Provides subcommands for working with workflow definition files:
//! - `run`: run one scheduling pass and print the outcome
//! - `describe`: list conditions, dependency edges and graph problems
//! - `template`: print the built-in starter workflow

pub mod describe;
pub mod run;
pub mod template;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Step Engine - conditional workflow step scheduling
#[derive(Parser)]
#[command(name = "step-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one scheduling pass over a workflow definition
    Run(run::RunArgs),

    /// Describe conditions and dependencies of a workflow definition
    Describe(describe::DescribeArgs),

    /// Print the built-in starter workflow definition
    Template(template::TemplateArgs),
}

fn load_config() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);
    config
}
