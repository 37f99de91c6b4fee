// src/main.rs
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timesheet_core::config::{Config, StoreKind};
use timesheet_core::http_api;
use timesheet_core::{InMemoryStore, RestStore, TimesheetService, TimesheetStore};

#[derive(Parser, Debug)]
#[command(version, about = "Timesheet submission and approval server")]
struct Cli {
    /// Address to listen on, overrides TIMESHEET_BIND_ADDR
    #[arg(long)]
    bind: Option<String>,

    /// Store backend, overrides TIMESHEET_STORE
    #[arg(long, value_enum)]
    store: Option<StoreKind>,

    /// Seed the in-memory store with demo weeks and users
    #[arg(long)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to read TIMESHEET_* configuration")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(store) = cli.store {
        config.store = store;
    }
    config.seed_demo |= cli.seed_demo;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn TimesheetStore> = match config.store {
        StoreKind::Memory => {
            if config.seed_demo {
                Arc::new(InMemoryStore::demo().await)
            } else {
                info!("Using empty in-memory store");
                Arc::new(InMemoryStore::new())
            }
        }
        StoreKind::Rest => {
            let rest_config = config.rest_store_config()?;
            info!("Using REST store at {}", rest_config.base_url);
            Arc::new(RestStore::new(rest_config).context("Failed to build REST store client")?)
        }
    };

    let service = Arc::new(TimesheetService::with_audit_capacity(
        store,
        config.audit_capacity,
    ));
    let app = http_api::router(service).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
