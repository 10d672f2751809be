pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tikidan")]
#[command(about = "Tikidan CLI - administrative tasks against the CRM document store")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the documents table and its indexes")]
    Migrate,

    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(long, help = "Login email")]
        email: String,
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Initial password")]
        password: String,
    },

    #[command(about = "Delete every GPS sample of one employee")]
    ResetLocations {
        #[arg(long, help = "Employee id")]
        employee: Uuid,
    },
}

#[derive(Debug, Clone, Copy)]
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
    let config = crate::config::config();

    match cli.command {
        Commands::Migrate => commands::migrate::handle(&config.database, output_format).await,
        Commands::CreateAdmin { email, name, password } => {
            commands::admin::handle(config, name, email, password, output_format).await
        }
        Commands::ResetLocations { employee } => commands::locations::handle(config, employee, output_format).await,
    }
}
