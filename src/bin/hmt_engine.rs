//! Engine binary: loads configuration, starts the supervisor, and serves the
//! control/webhook endpoints until terminated.

use hmt_engine::config::EngineConfig;
use hmt_engine::engine::Supervisor;
use hmt_engine::server;

#[tokio::main]
async fn main() -> hmt_engine::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = EngineConfig::from_env()?;
    tracing::info!(bind = %cfg.bind_addr, enabled = cfg.engine_enabled, "hmt-engine starting");

    let sup = Supervisor::new(cfg.clone())?;

    if cfg.engine_enabled {
        if let Err(e) = sup.start().await {
            // Recorded on /health; the background retry keeps trying.
            tracing::error!(error = %e, "initial start failed; will retry");
        }
    } else {
        tracing::warn!("ENGINE_ENABLED=false; serving control endpoints only");
    }

    let serve_sup = sup.clone();
    let result = server::serve(serve_sup, &cfg.bind_addr).await;

    sup.stop().await;
    result
}
