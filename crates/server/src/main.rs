use std::sync::Arc;

use anyhow::Context;

use cointask_common::config::{self, Config};
use cointask_server::gateway::{HttpVisionGateway, UnconfiguredGateway, VisionGateway};
use cointask_server::{router, AppState};
use cointask_store::LedgerDb;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Optional config file as the single CLI argument; env vars override.
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::load_from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => Config::default(),
    }
    .apply_env();

    let data_dir = cfg.data_dir.clone().unwrap_or_else(|| "./data".to_string());
    let db = LedgerDb::open(&data_dir)
        .with_context(|| format!("opening ledger store at {}", data_dir))?;

    let timeout_ms = cfg.vision_timeout_ms.unwrap_or(15_000);
    let gateway: Arc<dyn VisionGateway> = match cfg.vision_api_url.clone() {
        Some(url) => {
            tracing::info!(%url, timeout_ms, "vision classifier configured");
            Arc::new(
                HttpVisionGateway::new(url, cfg.vision_api_token.clone(), timeout_ms)
                    .context("building vision gateway client")?,
            )
        }
        None => {
            tracing::warn!("no vision classifier configured; verification will answer 503");
            Arc::new(UnconfiguredGateway)
        }
    };

    if cfg.admin_token.is_none() {
        tracing::warn!("no admin token configured; admin surface disabled");
    }

    let state = AppState {
        db,
        gateway,
        admin_token: cfg.admin_token.clone(),
    };
    let app = router(state);

    let bind_addr = cfg
        .bind_addr
        .clone()
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    tracing::info!("cointask server listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}
