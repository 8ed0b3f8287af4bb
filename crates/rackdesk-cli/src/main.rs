use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use rackdesk_core::{
    ConfigurationEntry, ConfigurationFilter, Console, ConsoleSettings, SettingsLoader, SourceKind,
};
use serde_json::{json, Value};
use std::path::Path;

const DEFAULT_SETTINGS_FILE: &str = "rackdesk.yaml";

#[derive(Parser, Debug)]
#[clap(name = "rackdesk", author, version = "0.1.0", about = "Rackdesk endpoint configuration tool")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        help = "Settings source: file path or URL (defaults to rackdesk.yaml when present)"
    )]
    config: Option<String>,

    #[clap(long, short, help = "Log level; overrides logging.level from the settings")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage configuration entries
    Config {
        #[clap(subcommand)]
        action: ConfigCommands,
    },
    /// Show configuration sources in precedence order
    Sources,
    /// Talk to a resource of the active configuration
    Resource {
        #[clap(subcommand)]
        action: ResourceCommands,
    },
    /// Inspect the storage backend
    Storage {
        #[clap(subcommand)]
        action: StorageCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// List configuration entries from every enabled source
    List {
        #[clap(long, help = "Only entries that define this service")]
        service: Option<String>,
    },
    /// Show one configuration entry
    Show { id: String },
    /// Add a persisted configuration entry
    Add {
        id: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long = "service", value_name = "NAME=URL", help = "Service api root, repeatable")]
        services: Vec<String>,
    },
    /// Replace a persisted configuration entry
    Update {
        id: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long = "service", value_name = "NAME=URL", help = "Service api root, repeatable")]
        services: Vec<String>,
    },
    /// Remove a persisted configuration entry
    Remove { id: String },
    /// Make a configuration entry the active one
    Select { id: String },
    /// Show the active configuration entry
    Current,
}

#[derive(Subcommand, Debug)]
enum ResourceCommands {
    /// List a resource collection
    Query {
        service: String,
        resource: String,
        #[clap(long = "param", value_name = "KEY=VALUE", help = "Query parameter, repeatable")]
        params: Vec<String>,
    },
    /// Read one member of a resource collection
    Get {
        service: String,
        resource: String,
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum StorageCommands {
    /// Show the storage backend in use and the keys it holds
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref()).await?;
    init_logging(&settings, cli.log_level.as_deref())?;

    let console = Console::from_settings(settings).context("Failed to set up console")?;

    let output = match cli.command {
        Commands::Config { action } => handle_config_command(&console, action).await?,
        Commands::Sources => handle_sources_command(&console),
        Commands::Resource { action } => handle_resource_command(&console, action).await?,
        Commands::Storage { action } => handle_storage_command(&console, action),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn load_settings(source: Option<&str>) -> Result<ConsoleSettings> {
    let settings = match source {
        Some(source) => SettingsLoader::from_source(source)
            .await
            .with_context(|| format!("Failed to load settings from {}", source))?,
        None if Path::new(DEFAULT_SETTINGS_FILE).exists() => {
            SettingsLoader::from_file(DEFAULT_SETTINGS_FILE).await?
        }
        None => SettingsLoader::from_env()?,
    };
    Ok(settings)
}

fn init_logging(settings: &ConsoleSettings, level_override: Option<&str>) -> Result<()> {
    let level = match level_override {
        Some(level) => level.parse().unwrap_or(LevelFilter::Info),
        None => settings.log_level(),
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    // stdout carries JSON output, so logs go to a file when one is configured
    if let Some(ref path) = settings.logging.file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

async fn handle_config_command(console: &Console, action: ConfigCommands) -> Result<Value> {
    let registry = console.registry();

    let output = match action {
        ConfigCommands::List { service } => {
            let filter = match service {
                Some(service) => ConfigurationFilter::by_service(service),
                None => ConfigurationFilter::all(),
            };
            serde_json::to_value(registry.query(&filter).await?)?
        }
        ConfigCommands::Show { id } => serde_json::to_value(registry.read(&id).await?)?,
        ConfigCommands::Add { id, name, services } => {
            let entry = build_entry(id, name, &services)?;
            serde_json::to_value(registry.create(entry).await?)?
        }
        ConfigCommands::Update { id, name, services } => {
            let entry = build_entry(id, name, &services)?;
            serde_json::to_value(registry.update(entry).await?)?
        }
        ConfigCommands::Remove { id } => {
            registry.remove(&id).await?;
            json!({ "removed": id })
        }
        ConfigCommands::Select { id } => {
            let entry = console.selection().set(id.as_str()).await?;
            serde_json::to_value(entry)?
        }
        ConfigCommands::Current => {
            let entry = console.selection().get().await?;
            serde_json::to_value(entry)?
        }
    };

    Ok(output)
}

fn handle_sources_command(console: &Console) -> Value {
    let sources: Vec<Value> = console
        .registry()
        .list_sources()
        .into_iter()
        .map(|status| {
            json!({
                "kind": status.kind.to_string(),
                "description": status.description,
                "enabled": status.enabled,
                "writable": status.kind.is_writable(),
            })
        })
        .collect();
    Value::Array(sources)
}

async fn handle_resource_command(console: &Console, action: ResourceCommands) -> Result<Value> {
    let output = match action {
        ResourceCommands::Query {
            service,
            resource,
            params,
        } => {
            let params = params
                .iter()
                .map(|param| parse_pair(param))
                .collect::<Result<Vec<_>>>()?;
            let client = console.resource(&service, &resource).await;
            Value::Array(client.query(&params).await?)
        }
        ResourceCommands::Get {
            service,
            resource,
            id,
        } => {
            let client = console.resource(&service, &resource).await;
            client.read(&id).await?
        }
    };

    Ok(output)
}

fn handle_storage_command(console: &Console, action: StorageCommands) -> Value {
    match action {
        StorageCommands::Info => {
            let storage = console.storage();
            json!({
                "backend": storage.name(),
                "keys": storage.keys(),
                "length": storage.length(),
                "persisted_source_enabled": console.registry().is_source_enabled(SourceKind::Persisted),
            })
        }
    }
}

fn build_entry(id: String, name: Option<String>, services: &[String]) -> Result<ConfigurationEntry> {
    let mut entry = ConfigurationEntry::new(id);
    if let Some(name) = name {
        entry = entry.with_name(name);
    }
    for service in services {
        let (service, api_root) = parse_pair(service)?;
        entry = entry.with_service(service, api_root);
    }
    Ok(entry)
}

/// Split `key=value`, rejecting an empty key
fn parse_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Missing key in '{}'", raw);
    }
    Ok((key.to_string(), value.trim().to_string()))
}
