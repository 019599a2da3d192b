use crypto_engine::analysis::Engine;
use crypto_engine::klines::YahooChartProvider;
use crypto_engine::notifier::SmtpNotifier;
use crypto_engine::storage_utils::AsyncStorageManager;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Step 1: Storage and configuration
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config = storage.load_config("config").await?;
    info!(storage = ?storage.base_dir, tickers = config.tickers.len(), "engine configured");

    // Step 2: Collaborators
    let provider = Arc::new(YahooChartProvider::new(config.request_timeout())?);
    let sink = Arc::new(SmtpNotifier::from_env(config.smtp.clone()));

    // Step 3: One engine pass
    let engine = Engine::new(provider, sink, storage, config);
    let report = engine.run().await;

    // Step 4: Display results
    println!("{}", crypto_engine::comfy_table::render(&report));

    Ok(())
}
