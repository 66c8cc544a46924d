use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use mockchat_core::config::ServiceConfig;
use mockchat_core::orchestrator::ConversationOrchestrator;
use mockchat_core::persistence::SqlitePersistence;
use mockchat_core::session::CredentialManager;
use mockchat_core::telemetry::init_tracing;
use mockchat_core::{providers, status};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;
    let _log_guard = init_tracing(&config.telemetry)?;

    let store = Arc::new(
        SqlitePersistence::bootstrap(config.database.sqlite())
            .context("failed to bootstrap conversation store")?,
    );
    let credentials = Arc::new(CredentialManager::new(&config.credentials, store.clone())?);
    let providers = providers::build(&config.providers)?;

    let report = status::collect(store.as_ref(), Some(providers.health.as_ref())).await;
    let orchestrator = ConversationOrchestrator::new(
        config.orchestrator.clone(),
        store.clone(),
        credentials,
        providers.set,
    );
    info!(
        target: "conversation",
        overall = ?report.overall,
        provider_timeout_ms = orchestrator.config().provider_timeout.as_millis() as u64,
        serialize_session_turns = orchestrator.config().serialize_session_turns,
        database = ?store.database_path(),
        "mockchat core ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(target: "conversation", "shutting down");
    Ok(())
}
