use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pokin_core::ReportKernel;
use pokin_http::config::ServiceConfig;
use pokin_store::MySqlReportSource;

const FIRST_PING: Duration = Duration::from_secs(10);
const RETRY_PING: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("LAPORAN TAGGING POHON KINERJA");

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let source = MySqlReportSource::connect_lazy(&config.database_url, &config.pool)
        .context("configuring database pool")?;
    pokin_http::wait_for_source(&source, FIRST_PING, RETRY_PING).await?;
    info!(
        max_connections = config.pool.max_connections,
        policy = ?config.enrichment,
        "database connected"
    );

    let kernel = Arc::new(ReportKernel::new(Arc::new(source), config.enrichment));
    let app = pokin_http::router(kernel);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "pohon kinerja report server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
