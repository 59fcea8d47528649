use log::debug;
use notewell_common::{Chunk, EmbedError, Embedder, StoreError, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("failed to embed question: {0}")]
    Embed(#[from] EmbedError),
    #[error("vector search failed: {0}")]
    Search(#[from] StoreError),
}

/// Read-only lookup of the chunks most relevant to a question.
#[allow(async_fn_in_trait)]
pub trait Retrieve {
    /// # Errors
    ///
    /// Returns an error if the question cannot be embedded or searched.
    async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>, RetrieveError>;
}

pub struct Retriever<S, E> {
    store: S,
    embedder: E,
    top_k: usize,
}

impl<S: VectorStore, E: Embedder> Retriever<S, E> {
    pub fn new(store: S, embedder: E, top_k: usize) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }
}

impl<S: VectorStore, E: Embedder> Retrieve for Retriever<S, E> {
    async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>, RetrieveError> {
        let vector = self.embedder.embed_query(question)?;
        let hits = self.store.search(&vector, self.top_k).await?;
        debug!(
            "Retrieved {} chunk(s); best score {:?}",
            hits.len(),
            hits.first().map(|h| h.score)
        );
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}
