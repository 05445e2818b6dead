use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use smartbi_core::config::{self, SmartBiConfig};
use smartbi_core::llm::{HostedModel, ModelClient};
use smartbi_server::{configure_routes, AppState};
use tracing_subscriber::EnvFilter;

mod args;

use args::Cli;

#[actix_web::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    let model = HostedModel::from_env(
        config.model.name.as_deref(),
        Duration::from_secs(config.model.timeout_secs),
    );
    match &model {
        Some(m) => tracing::info!("Using {} ({})", m.provider(), m.model_name()),
        None => tracing::warn!(
            "No model API key found; analysis endpoints will answer 503 until one is set"
        ),
    }
    let model = model.map(|m| Arc::new(m) as Arc<dyn ModelClient>);

    let bind_addr = (config.server.host.clone(), config.server.port);
    tracing::info!(
        "Starting SmartBI ({}) at http://{}:{}",
        config.server.environment,
        bind_addr.0,
        bind_addr.1
    );

    let state = web::Data::new(AppState::new(config, model));
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(configure_routes)
    })
    .bind(&bind_addr)
    .with_context(|| format!("could not bind {}:{}", bind_addr.0, bind_addr.1))?
    .run()
    .await?;

    Ok(())
}

/// File, then environment, then command line.
fn load_config(cli: &Cli) -> anyhow::Result<SmartBiConfig> {
    let mut config = match &cli.config {
        Some(path) => config::read_config_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("could not read working directory")?;
            config::read_config(&cwd)?.unwrap_or_default()
        }
    };
    config.apply_env()?;

    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(model) = &cli.model {
        config.model.name = Some(model.clone());
    }

    if let Some(path) = &config.source_path {
        tracing::info!("Loaded configuration from {}", path.display());
    }
    Ok(config)
}
