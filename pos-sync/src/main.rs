use anyhow::Context;
use pos_sync::{AppContext, BackgroundTasks, Config, api, print_banner, setup_environment};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (.env, work dir, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    setup_environment(&config).context("Failed to prepare work dir")?;

    print_banner();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), work_dir = %config.work_dir, "POS sync starting...");

    // 2. Composition root
    let port = config.http_port;
    let ctx = AppContext::open(config).context("Failed to open local store")?;
    ctx.initialize().await.context("Failed to load sync settings")?;

    // 3. Background tasks
    let mut tasks = BackgroundTasks::new();
    ctx.start_background_tasks(&mut tasks);
    tasks.log_summary();
    let shutdown = tasks.shutdown_token();

    // 4. HTTP server
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    let server = axum::serve(listener, api::router(ctx)).with_graceful_shutdown(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
            _ = shutdown.cancelled() => {}
        }
    });
    let result = server.await;

    tasks.check_health();
    tasks.shutdown(Duration::from_secs(10)).await;
    result.context("HTTP server error")?;
    Ok(())
}
