use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod context;
mod conversation;
mod db;
mod execution;
mod generate;
mod learning;
mod llm;
mod metadata;
#[cfg(test)]
mod testutil;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::context::ContextBuilder;
use crate::execution::warehouse::DuckWarehouse;
use crate::execution::{RetryConfig, RetryEngine};
use crate::generate::Orchestrator;
use crate::learning::LearningStore;
use crate::llm::LlmManager;
use crate::metadata::client::MetadataClient;
use crate::metadata::store::DuckCatalog;
use crate::metadata::{CatalogStore, ConversationStore};
use crate::util::cache::{Clock, SystemClock};
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args = CliArgs::parse();

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!("Opening catalog database: {}", config.catalog.db_path);
    let catalog_pool = db::build_pool(&config.catalog.db_path, config.catalog.pool_size)?;
    let catalog = Arc::new(DuckCatalog::new(catalog_pool));
    catalog.bootstrap().await?;

    info!("Opening warehouse database: {}", config.warehouse.db_path);
    let warehouse_pool = db::build_pool(&config.warehouse.db_path, config.warehouse.pool_size)?;
    let warehouse = Arc::new(DuckWarehouse::new(
        warehouse_pool,
        config.warehouse.query_timeout_secs,
    ));
    warehouse.bootstrap().await?;

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm = Arc::new(LlmManager::new(&config.llm)?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metadata = Arc::new(MetadataClient::new(
        Arc::clone(&catalog) as Arc<dyn CatalogStore>,
        config.cache.metadata_ttl_secs,
        Arc::clone(&clock),
    ));
    let learning = Arc::new(LearningStore::new(
        Arc::clone(&catalog) as Arc<dyn CatalogStore>,
        config.cache.rules_ttl_secs,
        clock,
    ));
    let conversations: Arc<dyn ConversationStore> = Arc::clone(&catalog) as Arc<dyn ConversationStore>;

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(ContextBuilder::new(Arc::clone(&metadata))),
        Arc::clone(&llm),
        Arc::clone(&conversations),
        Arc::clone(&learning),
        config.memory.window,
    ));
    let engine = Arc::new(RetryEngine::new(
        warehouse,
        llm,
        Arc::clone(&learning),
        RetryConfig {
            max_retries: config.retry.max_retries as u32,
            base_delay_ms: config.retry.base_delay_ms,
            multiplier: config.retry.multiplier,
            max_delay_ms: config.retry.max_delay_ms,
        },
    ));

    let app_state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        engine,
        conversations,
        metadata,
        learning,
    ));

    info!(
        "Starting sqlpilot server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    Ok(())
}
