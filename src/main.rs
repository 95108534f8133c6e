use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storm_predictor::{
    config::ServiceConfig,
    server::{router, AppState},
    ModelBundle, Predictor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cfg = ServiceConfig::from_env()?;

    let default_filter = if cfg.log_predictions {
        "storm_predictor=debug,tower_http=info"
    } else {
        "storm_predictor=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    let bundle = ModelBundle::load(&cfg.model_path)?;
    // Warmup so a broken artifact fails here, not on the first request
    bundle.warmup().context("model warmup failed")?;
    tracing::info!("warmup forward ok");
    tracing::info!(
        "loaded model bundle {}; features[{}]: {:?}",
        cfg.model_path.display(),
        bundle.schema().len(),
        bundle.schema().names()
    );

    let state = AppState::new(Predictor::new(Arc::new(bundle)));
    let app = router(state);

    let addr = cfg.socket_addr()?;
    tracing::info!("storm_predictor v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
