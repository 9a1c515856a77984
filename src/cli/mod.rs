pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "captify")]
#[command(about = "Captify platform host - package manifests, route table and service dispatch")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Serve the HTTP API (default)")]
    Serve,

    #[command(about = "Print the built route table")]
    Routes,

    #[command(about = "Validate manifests and build the route table")]
    Check,

    #[command(about = "Issue a development token signed with the configured secret")]
    Token {
        #[arg(long, help = "User id to embed in the token")]
        user: String,
        #[arg(long = "role", help = "Role to grant (repeatable)")]
        roles: Vec<String>,
        #[arg(long, help = "Email address")]
        email: Option<String>,
        #[arg(long, help = "Organization id")]
        org: Option<String>,
    },
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

pub async fn run(cli: Cli, config: &AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::handle(config).await,
        Commands::Routes => commands::inspect::routes(config, output_format),
        Commands::Check => commands::inspect::check(config, output_format),
        Commands::Token { user, roles, email, org } => {
            commands::token::handle(config, output_format, user, roles, email, org)
        }
    }
}
