use std::collections::{BTreeMap, BTreeSet};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use notewell_common::{Chunk, EmbedError, EmbeddedChunk, Embedder, StoreError, VectorStore};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub chunks_added: usize,
    pub chunks_replaced: usize,
    pub sources: usize,
}

/// Writes chunks into a vector store, embedding them on the way.
pub struct DocumentRepository<S, E> {
    store: S,
    embedder: E,
    batch_size: usize,
    replace_sources: bool,
}

impl<S: VectorStore, E: Embedder> DocumentRepository<S, E> {
    pub fn new(store: S, embedder: E) -> Self {
        Self {
            store,
            embedder,
            batch_size: 32,
            replace_sources: true,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Whether a source's earlier chunks are dropped before its new ones go in.
    #[must_use]
    pub fn with_source_replacement(mut self, replace: bool) -> Self {
        self.replace_sources = replace;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Embeds and stores the whole batch. Either every chunk makes it into
    /// the store call or the batch fails; an empty batch touches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or any store operation fails.
    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> Result<IndexReport, IndexError> {
        if chunks.is_empty() {
            info!("No chunks to index.");
            return Ok(IndexReport::default());
        }

        let sources: Vec<String> = chunks
            .iter()
            .filter_map(|c| c.source().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let vectors = self.embed_all(&chunks)?;

        let mut report = IndexReport {
            sources: sources.len(),
            ..IndexReport::default()
        };
        if self.replace_sources {
            report.chunks_replaced = self.store.delete_sources(&sources).await.map_err(|e| {
                error!("Failed to remove previous chunks: {e}");
                e
            })?;
            if report.chunks_replaced > 0 {
                info!(
                    "Removed {} previous chunk(s) of {} modified source(s).",
                    report.chunks_replaced,
                    sources.len()
                );
            }
        }

        let mut positions: BTreeMap<String, usize> = BTreeMap::new();
        let points: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let slot = positions
                    .entry(chunk.source().unwrap_or_default().to_string())
                    .or_default();
                let position = *slot;
                *slot += 1;
                EmbeddedChunk::new(chunk, position, vector)
            })
            .collect();

        report.chunks_added = points.len();
        self.store.add(points).await.map_err(|e| {
            error!("Failed to add chunks to the vector store: {e}");
            e
        })?;
        info!(
            "Indexed {} chunk(s) from {} source(s).",
            report.chunks_added, report.sources
        );
        Ok(report)
    }

    fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IndexError> {
        let bar = ProgressBar::new(chunks.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} chunks")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message("Embedding");

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed(&texts).map_err(|e| {
                bar.abandon_with_message("Embedding failed");
                error!("Failed to embed chunks: {e}");
                e
            })?;
            if embedded.len() != texts.len() {
                bar.abandon_with_message("Embedding failed");
                return Err(EmbedError::CountMismatch {
                    expected: texts.len(),
                    got: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
            bar.inc(batch.len() as u64);
        }
        bar.finish_with_message("Embedded");
        Ok(vectors)
    }
}
