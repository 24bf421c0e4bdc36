//! Market Research API — Binary Entrypoint
//! Boots the Axum HTTP server on Shuttle. Provider credentials come from the
//! Shuttle secret store, falling back to the process environment / `.env`.

use market_research_api::{app_with, telemetry, AppConfig};
use shuttle_axum::ShuttleAxum;
use shuttle_runtime::SecretStore;

#[shuttle_runtime::main]
async fn axum(#[shuttle_runtime::Secrets] secrets: SecretStore) -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();

    let cfg = AppConfig::from_lookup(|key| secrets.get(key).or_else(|| std::env::var(key).ok()))?;
    let router = app_with(cfg).await?;

    Ok(router.into())
}
