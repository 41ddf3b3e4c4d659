//! Cloud cost optimizer CLI
//!
//! A command-line tool for listing instances, moving them between idle and
//! busy, reading the audit trail and recording usage against the cost
//! optimizer server.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    audit::{self, ExportKind, Order},
    health,
    instances::{self, Transition},
    recommendations, usage,
};

/// Cloud cost optimizer CLI
#[derive(Parser)]
#[command(name = "cloudopt")]
#[command(author, version, about = "CLI for the cloud cost optimizer", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via CLOUDOPT_API_URL env var)
    #[arg(long, env = "CLOUDOPT_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List instances, or show one
    Instances {
        /// Instance ID
        id: Option<i64>,
    },

    /// Show idle-resource recommendations
    Recommendations {
        /// Evaluate recorded usage instead of instances
        #[arg(long)]
        usage: bool,

        /// Utilization threshold in percent
        #[arg(long)]
        threshold: Option<f64>,

        /// Fail on malformed records instead of skipping them
        #[arg(long)]
        strict: bool,
    },

    /// Drop an instance to idle
    Idle {
        /// Instance ID
        id: i64,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },

    /// Bring an instance back to a busy state
    Busy {
        /// Instance ID
        id: i64,

        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show the audit trail
    Audit {
        /// Maximum number of entries
        #[arg(long, short, default_value_t = 50)]
        limit: usize,

        /// Sort order
        #[arg(long, value_enum, default_value = "desc")]
        order: Order,
    },

    /// Show the transition history of one instance
    History {
        /// Instance ID
        id: i64,

        /// Maximum number of entries
        #[arg(long, short, default_value_t = 50)]
        limit: usize,
    },

    /// Record and list usage
    #[command(subcommand)]
    Usage(UsageCommands),

    /// Download a CSV export
    Export {
        /// What to export
        #[arg(value_enum)]
        kind: ExportKind,

        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<String>,

        /// Maximum audit rows
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Reinstall the demo instances and clear the audit trail
    Reseed,

    /// Show server health
    Health,

    /// Manage the CLI configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum UsageCommands {
    /// Record a usage sample
    Add {
        #[arg(long)]
        provider: String,

        #[arg(long)]
        service: String,

        #[arg(long)]
        resource_id: String,

        /// Usage amount, read as utilization percent
        #[arg(long)]
        amount: f64,

        #[arg(long)]
        cost: f64,
    },

    /// List recorded usage
    List,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,

    /// Update configuration values
    Set {
        #[arg(long)]
        api_url: Option<String>,

        #[arg(long)]
        actor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let command = match cli.command {
        Commands::Config(config_cmd) => return run_config(config_cmd, config),
        other => other,
    };

    // Initialize client
    let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url.as_deref()))?;
    let default_actor = config.default_actor.as_deref();

    // Execute command
    match command {
        Commands::Instances { id } => match id {
            Some(id) => instances::show_instance(&client, id, cli.format).await?,
            None => instances::list_instances(&client, cli.format).await?,
        },
        Commands::Recommendations {
            usage,
            threshold,
            strict,
        } => {
            recommendations::get_recommendations(&client, usage, threshold, strict, cli.format)
                .await?;
        }
        Commands::Idle { id, actor } => {
            let actor = actor.as_deref().or(default_actor);
            instances::transition(&client, id, Transition::Idle, actor, cli.format).await?;
        }
        Commands::Busy { id, actor } => {
            let actor = actor.as_deref().or(default_actor);
            instances::transition(&client, id, Transition::Busy, actor, cli.format).await?;
        }
        Commands::Audit { limit, order } => {
            audit::show_audit(&client, limit, order, cli.format).await?;
        }
        Commands::History { id, limit } => {
            audit::show_history(&client, id, limit, cli.format).await?;
        }
        Commands::Usage(usage_cmd) => match usage_cmd {
            UsageCommands::Add {
                provider,
                service,
                resource_id,
                amount,
                cost,
            } => {
                let record = client::NewUsage {
                    cloud_provider: provider,
                    service_name: service,
                    resource_id,
                    usage_amount: amount,
                    cost,
                };
                usage::add_usage(&client, record, cli.format).await?;
            }
            UsageCommands::List => usage::list_usage(&client, cli.format).await?,
        },
        Commands::Export {
            kind,
            output,
            limit,
        } => {
            audit::export(&client, kind, limit, output).await?;
        }
        Commands::Reseed => instances::reseed(&client, cli.format).await?,
        Commands::Health => health::show_health(&client, cli.format).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}

fn run_config(command: ConfigCommands, mut config: config::Config) -> Result<()> {
    match command {
        ConfigCommands::Show => output::print_json(&config)?,
        ConfigCommands::Set { api_url, actor } => {
            if api_url.is_some() {
                config.api_url = api_url;
            }
            if actor.is_some() {
                config.default_actor = actor;
            }
            let path = config.save()?;
            output::print_success(&format!("Saved {}", path.display()));
        }
    }
    Ok(())
}
