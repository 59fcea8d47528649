//! Deterministic test doubles for the embedding and storage seams.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::embedding::{EmbedError, Embedder};
use crate::model::{EmbeddedChunk, ScoredChunk};
use crate::store::{StoreError, VectorStore, cosine_similarity};

pub const MOCK_DIMENSION: usize = 16;

/// Hashes each lowercase word into a bucket, so texts sharing words score
/// close together.
#[derive(Debug, Default)]
pub struct MockEmbedder {
    pub fail: bool,
    calls: Mutex<usize>,
}

impl MockEmbedder {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.fail {
            return Err(EmbedError::Embed("mock embedding failure".into()));
        }
        *self.calls.lock().unwrap() += texts.len();
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; MOCK_DIMENSION];
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        let bucket = (hasher.finish() % MOCK_DIMENSION as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

/// In-memory store. `fail_add` makes every add return an error.
#[derive(Debug, Default)]
pub struct MockStore {
    pub fail_add: bool,
    points: Mutex<Vec<EmbeddedChunk>>,
}

impl MockStore {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_add: true,
            ..Self::default()
        }
    }

    pub fn points(&self) -> Vec<EmbeddedChunk> {
        self.points.lock().unwrap().clone()
    }
}

impl VectorStore for MockStore {
    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(!self.points.lock().unwrap().is_empty())
    }

    async fn add(&self, points: Vec<EmbeddedChunk>) -> Result<(), StoreError> {
        if self.fail_add {
            return Err(StoreError::Upsert("mock store failure".into()));
        }
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<usize, StoreError> {
        let mut points = self.points.lock().unwrap();
        let before = points.len();
        points.retain(|p| !p.chunk.source().is_some_and(|s| sources.iter().any(|x| x == s)));
        Ok(before - points.len())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let points = self.points.lock().unwrap();
        let mut scored: Vec<ScoredChunk> = points
            .iter()
            .map(|p| ScoredChunk {
                chunk: p.chunk.clone(),
                score: cosine_similarity(vector, &p.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.points.lock().unwrap().len())
    }
}
