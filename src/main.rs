use bistro_assistant::chat::{Assistant, ChatSettings};
use bistro_assistant::config::Config;
use bistro_assistant::db::Database;
use bistro_assistant::provider::ProviderPool;
use bistro_assistant::telegram;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Bistro Assistant v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Claude keys: {}", config.claude_keys.len());

    let db = match Database::open(&config.database_path) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {e}", config.database_path);
            std::process::exit(1);
        }
    };

    let pool = ProviderPool::new(config.claude_keys.clone(), &config.claude_model);
    let settings = ChatSettings {
        restaurant_name: config.restaurant_name.clone(),
        history_pairs: config.history_pairs,
        history_days: config.history_days,
        ..Default::default()
    };

    telegram::run_bot(config, Assistant::new(pool, db, settings)).await;
}
