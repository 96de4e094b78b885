use anyhow::Context;

use invoicer_api::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    invoicer_observability::init(config.log_format);

    if config.uses_dev_token() {
        tracing::warn!("API_TOKEN not set; using insecure dev default");
    }

    let app = invoicer_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
