mod commands;
pub mod error;
mod utils;


use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::commands::PageParams;
use crate::cli::error::{CliError, CliResult};
use crate::db::{
    AdapterConfig, ConnectionConfig, ConnectionManager, PersistenceAdapter, SqliteBackend,
    WriteConcern,
};

#[derive(Parser)]
#[command(name = "voltron")]
#[command(author, version, about = "Inspect and edit persisted resources", long_about = None)]
pub struct Cli {
    /// Database URL
    #[arg(long, global = true, env = "VOLTRON_URL", default_value = "sqlite://voltron.db")]
    pub url: String,

    /// User to authenticate as (requires --password)
    #[arg(long, global = true, env = "VOLTRON_USER")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(long, global = true, env = "VOLTRON_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Write concern: unacknowledged, acknowledged or journaled
    #[arg(long, global = true)]
    pub write_concern: Option<WriteConcern>,

    /// Primary-key field (default: the backend's)
    #[arg(long, global = true)]
    pub primary_key: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List records of a resource
    Find {
        resource: String,
        /// JSON object of field equalities
        #[arg(long = "where")]
        query: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        skip: Option<usize>,
        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,
        /// Sort order (asc or desc)
        #[arg(long)]
        order: Option<String>,
        /// Comma-separated fields to show
        #[arg(long)]
        fields: Option<String>,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show one record by id
    Get {
        resource: String,
        id: String,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Insert a record, or update it when it carries an id
    Save {
        resource: String,
        /// Record as a JSON object
        record: String,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Delete a record by id
    Remove { resource: String, id: String },
    /// List distinct values of a field
    Distinct {
        resource: String,
        field: String,
        /// JSON object of field equalities
        #[arg(long = "where")]
        query: Option<String>,
        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Commands {
    fn resource(&self) -> &str {
        match self {
            Commands::Find { resource, .. }
            | Commands::Get { resource, .. }
            | Commands::Save { resource, .. }
            | Commands::Remove { resource, .. }
            | Commands::Distinct { resource, .. } => resource,
        }
    }
}

/// Initialize tracing to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "voltron=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn connection_config(cli: &Cli) -> CliResult<ConnectionConfig> {
    let mut config = ConnectionConfig::from_url(&cli.url);
    match (&cli.user, &cli.password) {
        (Some(user), Some(password)) => config = config.with_credentials(user, password),
        (Some(_), None) => {
            return Err(CliError::InvalidArgument {
                message: "--user requires --password".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(CliError::InvalidArgument {
                message: "--password requires --user".to_string(),
            });
        }
        (None, None) => {}
    }
    if let Some(write_concern) = cli.write_concern {
        config = config.with_write_concern(write_concern);
    }
    Ok(config)
}

async fn execute(cli: Cli, command: Commands) -> CliResult<String> {
    let manager = Arc::new(ConnectionManager::new(
        SqliteBackend::new(),
        connection_config(&cli)?,
    ));
    let mut adapter_config = AdapterConfig::new(command.resource());
    if let Some(pk) = &cli.primary_key {
        adapter_config = adapter_config.with_primary_key(pk);
    }
    let adapter = PersistenceAdapter::new(manager, adapter_config)?;

    match command {
        Commands::Find {
            query,
            limit,
            skip,
            sort,
            order,
            fields,
            format,
            ..
        } => {
            let page = PageParams {
                limit,
                skip,
                sort: sort.as_deref(),
                order: order.as_deref(),
                fields: fields.as_deref(),
            };
            commands::record::find_records(&adapter, query.as_deref(), page, &format).await
        }
        Commands::Get { id, format, .. } => {
            commands::record::get_record(&adapter, &id, &format).await
        }
        Commands::Save { record, format, .. } => {
            commands::record::save_record(&adapter, &record, &format).await
        }
        Commands::Remove { id, .. } => commands::record::remove_record(&adapter, &id).await,
        Commands::Distinct {
            field,
            query,
            format,
            ..
        } => {
            commands::record::distinct_values(&adapter, &field, query.as_deref(), &format).await
        }
    }
}

pub async fn run() -> miette::Result<()> {
    let mut cli = Cli::parse();
    init_tracing();

    match cli.command.take() {
        Some(command) => {
            let output = execute(cli, command).await?;
            println!("{}", output);
        }
        None => {
            // Show help when no command provided
            let _ = Cli::parse_from(["voltron", "--help"]);
        }
    }
    Ok(())
}
