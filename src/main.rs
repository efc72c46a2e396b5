use anyhow::Context;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use helpdesk::core::config::AppConfig;
use helpdesk::core::shared::clock::{Clock, SystemClock};
use helpdesk::core::shared::state::AppState;
use helpdesk::directory::seed::DirectorySeed;
use helpdesk::llm::LLMProvider;
use helpdesk::store::{Directory, MemoryStore, TicketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (store, directory) = open_store(&config, clock.as_ref()).await?;
    let llm = llm_provider(&config);

    let bind_address = config.server.bind_address();
    let (state, background) = AppState::assemble(config, store, directory, clock, llm)?;
    let workers = background.monitor.start(background.sla_jobs);

    let app = helpdesk::router(state).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    info!("Starting HTTP server on {}", bind_address);

    let server_result = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    for worker in workers {
        worker.abort();
    }
    if let Err(e) = &server_result {
        error!("HTTP server error: {}", e);
    }
    info!("Server stopped");
    server_result.context("HTTP server failed")
}

type Stores = (Arc<dyn TicketStore>, Arc<dyn Directory>);

async fn open_store(config: &AppConfig, clock: &dyn Clock) -> anyhow::Result<Stores> {
    if let Some(stores) = open_database(config)? {
        if config.seed_path.is_some() {
            warn!("seed_path is ignored when a database is configured");
        }
        return Ok(stores);
    }

    let store = Arc::new(MemoryStore::new());
    match &config.seed_path {
        Some(path) => {
            DirectorySeed::from_path(path)?
                .apply(&store, clock.now())
                .await?;
        }
        None => warn!("No directory seed configured; the memory store starts empty"),
    }
    info!("Using in-memory store");
    let tickets: Arc<dyn TicketStore> = store.clone();
    let directory: Arc<dyn Directory> = store;
    Ok((tickets, directory))
}

#[cfg(feature = "postgres")]
fn open_database(config: &AppConfig) -> anyhow::Result<Option<Stores>> {
    let Some(url) = &config.database_url else {
        return Ok(None);
    };
    let store = Arc::new(helpdesk::store::PgStore::connect(url)?);
    store.run_migrations()?;
    info!("Using PostgreSQL store");
    let tickets: Arc<dyn TicketStore> = store.clone();
    let directory: Arc<dyn Directory> = store;
    Ok(Some((tickets, directory)))
}

#[cfg(not(feature = "postgres"))]
fn open_database(config: &AppConfig) -> anyhow::Result<Option<Stores>> {
    if config.database_url.is_some() {
        warn!("database_url is set but the postgres feature is disabled; using the memory store");
    }
    Ok(None)
}

#[cfg(feature = "llm")]
fn llm_provider(config: &AppConfig) -> Option<Arc<dyn LLMProvider>> {
    let llm = config.assignment.llm.as_ref()?;
    info!("Using LLM at {} with model {}", llm.base_url, llm.model);
    Some(Arc::new(helpdesk::llm::OpenAIClient::new(
        llm.api_key.clone(),
        Some(llm.base_url.clone()),
        llm.model.clone(),
    )))
}

#[cfg(not(feature = "llm"))]
fn llm_provider(config: &AppConfig) -> Option<Arc<dyn LLMProvider>> {
    if config.assignment.llm.is_some() {
        warn!("assignment.llm is configured but the llm feature is disabled");
    }
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
