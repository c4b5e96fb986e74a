use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::TransactionalBackend;
use super::constants::{
    ENV_API_KEY_SECRET, ENV_CONFIG, ENV_DATABASE_BACKEND, ENV_HOST, ENV_INTERNAL_API_KEY,
    ENV_INTERNAL_TENANT, ENV_PORT, ENV_POSTGRES_URL, ENV_RETENTION_DAYS,
};

#[derive(Parser)]
#[command(name = "apiinsight")]
#[command(version, about = "API request analytics: ingestion, hourly rollups, retention", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Global event retention in days; also the ceiling for per-key values (0 = keep forever)
    #[arg(long, global = true, env = ENV_RETENTION_DAYS)]
    pub retention_days: Option<u32>,

    /// Transactional database backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_DATABASE_BACKEND, value_parser = parse_transactional_backend)]
    pub database_backend: Option<TransactionalBackend>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    /// Internal API key; enables self-reporting of this server's own requests
    #[arg(long, global = true, env = ENV_INTERNAL_API_KEY, hide_env_values = true)]
    pub internal_api_key: Option<String>,

    /// Tenant that owns the internal API key
    #[arg(long, global = true, env = ENV_INTERNAL_TENANT)]
    pub internal_tenant: Option<String>,

    /// Secret used to hash API keys (hex); generated and stored in the data dir if unset
    #[arg(long, global = true, env = ENV_API_KEY_SECRET, hide_env_values = true)]
    pub api_key_secret: Option<String>,
}

/// Parse transactional backend from CLI/env string
fn parse_transactional_backend(s: &str) -> Result<TransactionalBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(TransactionalBackend::Sqlite),
        "postgres" | "postgresql" => Ok(TransactionalBackend::Postgres),
        _ => Err(format!(
            "Invalid database backend '{}'. Valid options: sqlite, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// API key management
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum KeyCommands {
    /// Create an API key and print it once
    Create {
        /// Owning tenant (account id)
        #[arg(long)]
        tenant: String,
        /// Project name events are recorded under
        #[arg(long)]
        name: String,
        /// Deployment environment label
        #[arg(long, default_value = "prod")]
        environment: String,
        /// Retention override in days (0 = global default); clamped to the global ceiling
        #[arg(long, default_value_t = 0)]
        retention_days: u32,
    },
    /// List API keys
    List {
        /// Only keys of this tenant
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Deactivate keys whose display prefix matches
    Deactivate {
        /// Key prefix as shown by `keys list`
        prefix: String,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub retention_days: Option<u32>,
    pub database_backend: Option<TransactionalBackend>,
    pub postgres_url: Option<String>,
    pub internal_api_key: Option<String>,
    pub internal_tenant: Option<String>,
    pub api_key_secret: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        retention_days: cli.retention_days,
        database_backend: cli.database_backend,
        postgres_url: cli.postgres_url,
        internal_api_key: cli.internal_api_key,
        internal_tenant: cli.internal_tenant,
        api_key_secret: cli.api_key_secret,
    };
    (config, cli.command)
}
