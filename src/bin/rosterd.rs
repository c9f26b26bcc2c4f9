use std::path::PathBuf;
use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use tokio::net::TcpListener;
use tokio::signal;

use roster::{
    Catalog, DataStore, InMemoryDataStore, RosterConfig, SchemaRegistry, create_router,
    logging, sql::PostgresDataStore,
};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Path to a YAML configuration file")]
    config: Option<String>,
    #[arrrg(optional, "Host to bind the HTTP server")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind the HTTP server")]
    port: Option<u16>,
    #[arrrg(optional, "PostgreSQL connection string; records stay in memory without one")]
    database_url: Option<String>,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
}

const HELP_TEXT: &str = r#"rosterd - schema-driven entity service

USAGE:
    rosterd [OPTIONS]

OPTIONS:
    --config <PATH>          YAML configuration file (server, storage, entities)
    --host <HOST>            Host to bind the HTTP server [default: 127.0.0.1]
    --port <PORT>            Port to bind the HTTP server [default: 8000]
    --database-url <URL>     PostgreSQL connection string [default: $DATABASE_URL, else in-memory]
    --verbose                Enable verbose logging

DESCRIPTION:
    Serves every configured entity (the built-in `user` entity when the
    configuration declares none) under /{entity}/.

    The server supports graceful shutdown via Ctrl+C.

API ENDPOINTS (per entity):
    POST   /{entity}/                      Create a record
    GET    /{entity}/                      List all records
    GET    /{entity}/count/                Count records
    GET    /{entity}/paginated/?skip&limit Page through records
    GET    /{entity}/search/?field=value   Search by field equality
    GET    /{entity}/{id}/                 Get a record
    PUT    /{entity}/{id}/                 Replace a record
    DELETE /{entity}/{id}/                 Delete a record
    POST   /{entity}/bulk/                 Create many records, all or nothing
    DELETE /{entity}/bulk/                 Delete many records by id"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = Args::from_command_line("USAGE: rosterd [OPTIONS]");

    if !free.is_empty() && free[0] == "help" {
        println!("{}", HELP_TEXT);
        return Ok(());
    }

    let config = ServerConfig::from_args(args)?;
    logging::init_logging(config.verbose);

    let registry = config.roster.registry()?;
    tracing::info!(
        entities = ?registry.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
        "schemas loaded"
    );

    match &config.roster.storage.database_url {
        Some(url) => {
            let store = PostgresDataStore::connect(
                url,
                config.roster.storage.max_connections,
                config.roster.storage.acquire_timeout(),
            )
            .await?;
            tracing::info!(
                max_connections = config.roster.storage.max_connections,
                "connected to PostgreSQL"
            );
            serve(&config, &registry, store).await
        }
        None => {
            tracing::info!("no database configured; records are kept in memory");
            serve(&config, &registry, InMemoryDataStore::new()).await
        }
    }
}

async fn serve<S: DataStore>(
    config: &ServerConfig,
    registry: &SchemaRegistry,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::new(registry, Arc::new(store));
    catalog.ensure_collections().await?;
    let app = create_router(&catalog);

    let addr = format!(
        "{}:{}",
        config.roster.server.host, config.roster.server.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(%addr, "rosterd listening");
    if let Some(path) = &config.config_path {
        tracing::debug!(config = %path.display(), "configuration file");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("rosterd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, stopping server gracefully");
}

struct ServerConfig {
    config_path: Option<PathBuf>,
    roster: RosterConfig,
    verbose: bool,
}

impl ServerConfig {
    fn from_args(args: Args) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = args.config.map(PathBuf::from);
        let mut roster = match &config_path {
            Some(path) => RosterConfig::from_file(path)?,
            None => RosterConfig::default(),
        };
        if let Some(host) = args.host {
            roster.server.host = host;
        }
        if let Some(port) = args.port {
            roster.server.port = port;
        }
        if args.database_url.is_some() {
            roster.storage.database_url = args.database_url;
        }
        Ok(Self {
            config_path,
            roster: roster.with_env(),
            verbose: args.verbose,
        })
    }
}
