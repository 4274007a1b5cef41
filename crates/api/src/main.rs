use anyhow::Context;

use gomeetup_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("pretty") => gomeetup_observability::init_pretty(),
        _ => gomeetup_observability::init(),
    }

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!(
        environment = ?config.environment,
        persistent = config.use_persistent_stores,
        "configuration loaded"
    );

    let services = gomeetup_api::app::services::build_services(&config)
        .await
        .context("failed to build services")?;
    let app = gomeetup_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
