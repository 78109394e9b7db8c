//! Template command - prints the built-in starter workflow

use clap::{Args, ValueEnum};

use crate::infrastructure::workflow::WorkflowDefinition;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum TemplateFormat {
    #[default]
    Json,
    Toml,
}

/// Arguments for the template command
#[derive(Args, Clone, Debug)]
pub struct TemplateArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = TemplateFormat::Json)]
    pub format: TemplateFormat,
}

pub fn run(args: TemplateArgs) -> anyhow::Result<()> {
    println!("{}", render(args.format)?);
    Ok(())
}

fn render(format: TemplateFormat) -> anyhow::Result<String> {
    let definition = WorkflowDefinition::starter()?;

    Ok(match format {
        TemplateFormat::Json => definition.to_json_pretty()?,
        TemplateFormat::Toml => definition.to_toml_string()?,
    })
}
