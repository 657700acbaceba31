use anyhow::Context;

use almox_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load().context("failed to load configuration")?;
    almox_observability::init_with_filter(&config.log.filter);

    let addr = config.bind_addr();
    let app = almox_api::app::build_app(config).await;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
