use log::info;

use crate::config::{Settings, StoreKind};
use crate::local_store::LocalStore;
use crate::model::{EmbeddedChunk, ScoredChunk};
use crate::qdrant_store::QdrantStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector store not found at {0}; run ingestion first")]
    Missing(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("vector dimension mismatch: store holds {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
}

/// Persistent nearest-neighbour store for embedded chunks.
///
/// Ingestion only appends (and, when replacing modified files, deletes by
/// source); the query side only searches.
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Whether anything has been persisted at the configured location.
    async fn exists(&self) -> Result<bool, StoreError>;

    async fn add(&self, points: Vec<EmbeddedChunk>) -> Result<(), StoreError>;

    /// Removes every chunk whose `source` is listed. Returns how many went.
    async fn delete_sources(&self, sources: &[String]) -> Result<usize, StoreError>;

    /// Closest chunks first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// Backend chosen by [`Settings::store`].
#[derive(Debug)]
pub enum AnyStore {
    Local(LocalStore),
    Qdrant(QdrantStore),
}

impl AnyStore {
    /// Opens the configured store without creating anything on disk or on
    /// the server; creation is deferred to the first non-empty add.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing local index cannot be read or the
    /// Qdrant client cannot be built.
    pub fn open(settings: &Settings) -> Result<Self, StoreError> {
        match settings.store {
            StoreKind::Local => {
                info!("Opening local vector store at {}", settings.persist_dir.display());
                Ok(Self::Local(LocalStore::open(&settings.persist_dir)?))
            }
            StoreKind::Qdrant => {
                info!(
                    "Connecting to Qdrant at {} (collection '{}')",
                    settings.qdrant_url, settings.qdrant_collection
                );
                Ok(Self::Qdrant(QdrantStore::connect(
                    &settings.qdrant_url,
                    &settings.qdrant_collection,
                )?))
            }
        }
    }

    /// Opens a store that must already hold an index.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Missing`] if nothing has been ingested yet.
    pub async fn open_existing(settings: &Settings) -> Result<Self, StoreError> {
        let store = Self::open(settings)?;
        if !store.exists().await? {
            let location = match settings.store {
                StoreKind::Local => settings.persist_dir.display().to_string(),
                StoreKind::Qdrant => format!(
                    "{} (collection '{}')",
                    settings.qdrant_url, settings.qdrant_collection
                ),
            };
            return Err(StoreError::Missing(location));
        }
        Ok(store)
    }
}

impl VectorStore for AnyStore {
    async fn exists(&self) -> Result<bool, StoreError> {
        match self {
            Self::Local(s) => s.exists().await,
            Self::Qdrant(s) => s.exists().await,
        }
    }

    async fn add(&self, points: Vec<EmbeddedChunk>) -> Result<(), StoreError> {
        match self {
            Self::Local(s) => s.add(points).await,
            Self::Qdrant(s) => s.add(points).await,
        }
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<usize, StoreError> {
        match self {
            Self::Local(s) => s.delete_sources(sources).await,
            Self::Qdrant(s) => s.delete_sources(sources).await,
        }
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        match self {
            Self::Local(s) => s.search(vector, limit).await,
            Self::Qdrant(s) => s.search(vector, limit).await,
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        match self {
            Self::Local(s) => s.count().await,
            Self::Qdrant(s) => s.count().await,
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
