use std::sync::Arc;

use clap::Parser;
use prospect_core::{ChatCompletionClient, Interpreter, ProspectConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use prospect_server::handler::ChatHandler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "prospect.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ProspectConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let default_level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();

    // Connect to the exchange store
    let store = match prospect_core::create_store(&config.database).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open {} store: {}", config.database.backend, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ {} store connected: {}", store.name(), v),
            Err(e) => {
                println!("❌ {} store check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }

        println!("✅ Prospect health check passed");
        return Ok(());
    }

    // Completion client; the API key must be present before serving
    let client = match ChatCompletionClient::from_config(&config.completion) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create completion client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        model = %client.settings().model,
        base_url = %client.settings().base_url,
        store = store.name(),
        "Completion client ready"
    );

    let interpreter = Interpreter::new(Arc::new(client));
    let handler = ChatHandler::new(interpreter, store, config.http.history_limit);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    prospect_server::http::start_http_server(handler, config, tx.subscribe()).await?;

    Ok(())
}
