//! tyr-api HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the policy engine and the document analysis
//! client, then serves the REST API and the metrics endpoint.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use std::future::Future;
use std::sync::Arc;
use tyr_api::app::{AppState, build_router};
use tyr_api::auth::TokenService;
use tyr_api::config::ApiConfig;
use tyr_api::observability;
use tyr_api::ocr::AzureClient;
use tyr_api::store::Store;
use tyr_api::store::memory::InMemoryStore;
use tyr_api::store::postgres::PostgresStore;
use tyr_authz::Enforcer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env_or_yaml()?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ApiConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("tyr-api", config.debug);
    let state = build_state(&config).await?;
    tracing::info!(
        backend = state.store.backend_name(),
        durable = state.store.is_durable(),
        "store ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "api listening");
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
        }
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &ApiConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn Store + Send + Sync> = match &config.database {
        Some(database) => Arc::new(PostgresStore::connect(database).await?),
        None => {
            tracing::warn!("no database configured; using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };
    let enforcer = Enforcer::seeded()?;
    let analyzer = Arc::new(AzureClient::new(&config.azure, store.clone())?);
    Ok(AppState::new(
        store,
        enforcer,
        TokenService::new(&config.jwt),
        analyzer,
    ))
}
