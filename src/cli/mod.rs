pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::database::models::load_registry;

#[derive(Parser)]
#[command(name = "kcore")]
#[command(about = "kcore CLI - inspect descriptor catalogs and render resource SQL offline")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "YAML descriptor catalog (default: KCORE_CATALOG, then the built-in sample)")]
    pub catalog: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show a resource's columns, joins and computed fields")]
    Describe(commands::describe::DescribeArgs),

    #[command(about = "Render the list and count SQL for a resource without a database")]
    Sql(commands::sql::SqlArgs),

    #[command(about = "Load and validate a descriptor catalog")]
    Validate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let catalog = cli.catalog.clone().or_else(|| std::env::var("KCORE_CATALOG").ok().filter(|p| !p.is_empty()));
    let registry = load_registry(catalog.as_deref())?;
    tracing::debug!(catalog = ?catalog, resources = registry.resource_names().len(), "Catalog loaded");

    match cli.command {
        Commands::Describe(args) => commands::describe::handle(args, &registry, output_format).await,
        Commands::Sql(args) => commands::sql::handle(args, &registry, output_format).await,
        Commands::Validate => commands::validate::handle(catalog.as_deref(), &registry, output_format).await,
    }
}
