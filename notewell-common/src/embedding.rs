use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use log::info;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
    #[error("failed to initialize embedding model: {0}")]
    Init(String),
    #[error("failed to generate embeddings: {0}")]
    Embed(String),
    #[error("embedding model returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

/// Turns text into vectors. Calls block until the model returns.
pub trait Embedder {
    /// # Errors
    ///
    /// Returns an error if the model fails to encode any of the inputs.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// # Errors
    ///
    /// Returns an error if the model fails to encode the query.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed(&[text.to_string()])?;
        match vectors.len() {
            1 => Ok(vectors.swap_remove(0)),
            got => Err(EmbedError::CountMismatch { expected: 1, got }),
        }
    }
}

/// Local ONNX sentence embeddings via fastembed.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    batch_size: Option<usize>,
}

impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl FastEmbedder {
    /// Loads (downloading on first use) the model named by `model_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name matches no supported model or the model
    /// cannot be initialized.
    pub fn new(model_name: &str, batch_size: Option<usize>) -> Result<Self, EmbedError> {
        let model = resolve_model(model_name)?;
        info!("Initializing embedding model {model_name}...");
        let text_model =
            TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
                .map_err(|e| EmbedError::Init(e.to_string()))?;
        info!("Embedding model initialized.");
        Ok(Self {
            model: Mutex::new(text_model),
            batch_size,
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbedError::Embed(e.to_string()))?;
        let vectors = model
            .embed(inputs, self.batch_size)
            .map_err(|e| EmbedError::Embed(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }
}

/// Maps a model identifier onto one of fastembed's supported models.
///
/// Accepts the exact model code (`Qdrant/all-MiniLM-L6-v2-onnx`) as well as
/// the upstream name (`sentence-transformers/all-MiniLM-L6-v2`).
///
/// # Errors
///
/// Returns [`EmbedError::UnknownModel`] when nothing matches.
pub fn resolve_model(name: &str) -> Result<EmbeddingModel, EmbedError> {
    let wanted = name.trim();
    if let Some(model) = upstream_alias(wanted) {
        return Ok(model);
    }
    let supported = TextEmbedding::list_supported_models();

    if let Some(info) = supported
        .iter()
        .find(|info| info.model_code.eq_ignore_ascii_case(wanted))
    {
        return Ok(info.model.clone());
    }

    let wanted_tail = model_tail(wanted);
    supported
        .iter()
        .find(|info| model_tail(&info.model_code) == wanted_tail)
        .map(|info| info.model.clone())
        .ok_or_else(|| EmbedError::UnknownModel(name.to_string()))
}

fn upstream_alias(name: &str) -> Option<EmbeddingModel> {
    match name.to_ascii_lowercase().as_str() {
        "sentence-transformers/all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "sentence-transformers/all-minilm-l12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "baai/bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        _ => None,
    }
}

fn model_tail(code: &str) -> String {
    let tail = code.rsplit('/').next().unwrap_or(code).to_ascii_lowercase();
    tail.strip_suffix("-onnx").map(str::to_string).unwrap_or(tail)
}
