use std::sync::Arc;

use clap::Parser;
use labs_core::{DeepSeekClient, LabsConfig};
use labs_ingest::store::PgSessionStore;
use labs_server::http::{self, HttpState};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "labs.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match LabsConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match labs_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match labs_core::db::health_check(&pool).await {
            Ok(v) => println!("PostgreSQL connected: {}", v),
            Err(e) => {
                println!("PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("Learning Labs DB health check passed");
        return Ok(());
    }

    if let Err(e) = labs_core::db::run_migrations(&pool).await {
        eprintln!("Failed to apply migrations: {}", e);
        std::process::exit(1);
    }

    // The AI key is mandatory: reports and tutoring are the core surface.
    let ai = match DeepSeekClient::new(config.ai.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to create AI client ({}). Set LABS__AI__API_KEY or DEEPSEEK_API_KEY.", e);
            std::process::exit(1);
        }
    };

    // Shutdown signal
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = Arc::new(HttpState {
        pool: pool.clone(),
        config,
        store: Arc::new(PgSessionStore::new(pool)),
        ai,
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
