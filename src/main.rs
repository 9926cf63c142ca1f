mod app;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use app::App;
use robocoach::config::{Config, APP_ID, MISSING_CREDENTIAL_ERROR};
use robocoach::providers::GeminiProvider;
use robocoach::services::{
    Database, GenerationClient, Persistence, SessionContext, SessionController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::info!(app_id = APP_ID, ?config, "Starting");

    if !config.has_credential() {
        tracing::error!("{}", MISSING_CREDENTIAL_ERROR);
    }

    let db = Database::open(&config.db_path())
        .await
        .context("Failed to open storage")?;

    let context = SessionContext::init(db.clone(), &config)
        .await
        .context("Failed to initialize session context")?;

    let generation = GenerationClient::new(
        Arc::new(GeminiProvider::new()),
        context.credential().map(str::to_string),
        config.model.clone(),
        config.base_url.clone(),
    )
    .with_temperature(config.temperature);

    let controller = SessionController::load(Persistence::new(db), generation, context).await;

    App::new(controller).run().await
}
