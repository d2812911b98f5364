use std::sync::Arc;

use anyhow::Context;
use tally_accounting::Ledger;
use tally_api::app::{self, AppServices};
use tally_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    tally_observability::init_with(config.log_format);

    let ledger = Arc::new(Ledger::new());
    let services = Arc::new(
        AppServices::build(ledger, &config).context("failed to start ledger worker")?,
    );
    let app = app::build_app(Arc::clone(&services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        execution = ?config.execution,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    services.stop();
    Ok(())
}
