use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use invoicer_documents::{InvoiceRenderer, converter_from_setting};
use invoicer_infra::{Assembler, EntityStore, InMemoryStore, SqliteStore};

use crate::config::AppConfig;

/// Everything handlers need, built once at startup.
pub struct AppServices {
    pub store: Arc<dyn EntityStore>,
    pub assembler: Assembler,
    pub renderer: InvoiceRenderer,
}

impl AppServices {
    pub fn new(store: Arc<dyn EntityStore>, renderer: InvoiceRenderer) -> Self {
        Self {
            assembler: Assembler::new(store.clone()),
            store,
            renderer,
        }
    }
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store = build_store(config).await?;

    let converter =
        converter_from_setting(&config.pdf_converter).context("invalid PDF_CONVERTER")?;
    let renderer = InvoiceRenderer::new(converter).context("failed to compile invoice template")?;
    info!(converter = renderer.converter_name(), "pdf converter ready");

    Ok(AppServices::new(store, renderer))
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    if config.uses_memory_store() {
        info!("using in-memory store; data is lost on exit");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let store = SqliteStore::connect(&config.database_url, config.database_max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    info!(database_url = %config.database_url, "sqlite store ready");
    Ok(Arc::new(store))
}
