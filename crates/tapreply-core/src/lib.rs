pub mod config;
pub mod engine;
pub mod generator;
pub mod intent;
pub mod phrase_bank;

pub use config::*;
pub use engine::*;
pub use generator::*;
pub use intent::classify;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tapreply_memory::{HistoryStore, WeightStore};

/// Builds the generator for `config`. A missing credential or an unusable
/// provider degrades to [`UnavailableGenerator`] instead of failing startup.
pub fn build_generator(config: &AppConfig) -> Arc<dyn ReplyGenerator> {
    let llm = &config.provider;
    let Some(api_key) = llm.api_key() else {
        tracing::warn!(
            env = %llm.api_key_env,
            "no API key configured, serving phrase-bank suggestions only"
        );
        return Arc::new(UnavailableGenerator::new(format!(
            "{} is not set",
            llm.api_key_env
        )));
    };

    match tapreply_provider::create_provider(&llm.provider_config(api_key)) {
        Ok(provider) => Arc::new(
            LlmReplyGenerator::new(provider, llm.model.clone())
                .with_max_tokens(llm.max_tokens(config.suggestions.history_aware))
                .with_temperature(llm.temperature)
                .with_timeout(Duration::from_secs(llm.timeout_secs)),
        ),
        Err(error) => {
            tracing::warn!(%error, "failed to create provider, serving phrase-bank suggestions only");
            Arc::new(UnavailableGenerator::new(error.to_string()))
        }
    }
}

/// Loads both stores from the configured data directory and wires the engine.
pub async fn build_engine(root: &Path, config: &AppConfig) -> Result<SuggestionEngine> {
    let data_dir = config.storage.data_dir(root);
    tokio::fs::create_dir_all(&data_dir).await?;

    let weights = Arc::new(WeightStore::open(config.storage.weights_path(root)).await);
    let history = Arc::new(
        HistoryStore::open(
            config.storage.history_path(root),
            config.history.max_exchanges_per_session,
        )
        .await,
    );

    Ok(SuggestionEngine::new(
        weights,
        history,
        build_generator(config),
        config.suggestions.clone(),
    ))
}
