use log::info;
use notewell_common::{AnyStore, ConfigError, EmbedError, FastEmbedder, Settings, StoreError};

use crate::llm::{LlmError, OllamaModel};
use crate::retriever::Retriever;
use crate::session::QuerySession;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load vector store: {0}")]
    Store(#[from] StoreError),
    #[error("failed to initialize embeddings: {0}")]
    Embed(#[from] EmbedError),
    #[error("failed to load Ollama model: {0}")]
    Llm(#[from] LlmError),
}

pub type LiveSession = QuerySession<Retriever<AnyStore, FastEmbedder>, OllamaModel>;

/// Builds everything the session needs. Any failure here ends the program.
///
/// # Errors
///
/// Returns an error if `OLLAMA_MODEL` is unset, nothing has been ingested
/// yet, or the embedding model or Ollama cannot be brought up.
pub async fn bootstrap(settings: &Settings) -> Result<LiveSession, StartupError> {
    let model_name = settings.require_llm_model()?;
    let model = OllamaModel::new(&settings.ollama_host, model_name)?;

    let store = AnyStore::open_existing(settings).await?;
    let embedder = FastEmbedder::new(&settings.embedding_model, Some(settings.embedding_batch_size))?;
    let retriever = Retriever::new(store, embedder, settings.top_k);
    info!("Vector store loaded successfully.");

    model.health_check().await?;
    info!("Ollama model '{}' loaded successfully.", model.model());

    Ok(QuerySession::new(retriever, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_model_name_is_fatal() {
        let err = bootstrap(&Settings::default()).await.err().unwrap();
        assert!(matches!(err, StartupError::Config(ConfigError::Missing { .. })));
    }

    #[tokio::test]
    async fn malformed_ollama_host_is_fatal() {
        let settings = Settings {
            llm_model: Some("llama3".to_string()),
            ollama_host: "http://:11434".to_string(),
            ..Settings::default()
        };
        let err = bootstrap(&settings).await.err().unwrap();
        assert!(matches!(err, StartupError::Llm(LlmError::InvalidHost { .. })));
    }

    #[tokio::test]
    async fn missing_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            persist_dir: dir.path().join("db"),
            llm_model: Some("llama3".to_string()),
            ..Settings::default()
        };
        let err = bootstrap(&settings).await.err().unwrap();
        assert!(matches!(err, StartupError::Store(StoreError::Missing(_))));
    }
}
