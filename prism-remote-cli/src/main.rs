use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prism_remote::{
    ClusterNameResolver, RemoteClusterRegistry, RemoteClusterService, RemoteConfig,
    WildcardResolver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "prism-remote")]
#[command(about = "Prism remote cluster tools")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "prism-remote.toml", env = "PRISM_REMOTE_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List configured remote clusters and their connection settings
    List,

    /// Group index expressions by target cluster
    Group {
        /// Index expressions, e.g. `logs`, `east:logs`, `eu-*:metrics`
        #[arg(required = true)]
        indices: Vec<String>,
    },

    /// Resolve a cluster alias expression
    Resolve {
        /// Alias or wildcard expression
        expression: String,
    },
}

fn init_tracing(config: &RemoteConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{},prism_remote=debug", config.logging.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = RemoteConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    init_tracing(&config);

    tracing::debug!("Config file: {}", cli.config.display());

    let service = Arc::new(RemoteClusterService::new());
    let registry = RemoteClusterRegistry::new(Arc::clone(&service));
    let settings = config.to_settings().context("Invalid remote cluster config")?;
    registry
        .initialize(&settings)
        .await
        .context("Failed to initialize remote clusters")?;

    match cli.command {
        Commands::List => {
            let connections: Vec<_> = service
                .connections()
                .iter()
                .map(|conn| {
                    serde_json::json!({
                        "alias": conn.alias(),
                        "state": registry.state(conn.alias()).as_str(),
                        "config": conn.config(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&connections)?);
        }
        Commands::Group { indices } => {
            let groups = registry.group_indices(&indices)?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        Commands::Resolve { expression } => {
            let aliases =
                WildcardResolver.resolve_cluster_names(&registry.remote_clusters(), &expression)?;
            println!("{}", serde_json::to_string_pretty(&aliases)?);
        }
    }

    Ok(())
}
