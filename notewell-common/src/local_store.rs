use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::info;
use serde::{Deserialize, Serialize};

use crate::model::{EmbeddedChunk, ScoredChunk};
use crate::store::{StoreError, VectorStore, cosine_similarity};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    dimension: Option<usize>,
    points: Vec<EmbeddedChunk>,
}

/// Brute-force store persisted as one JSON file inside a directory.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    index: RwLock<IndexFile>,
}

impl LocalStore {
    /// Reads an existing index if there is one. Nothing is created here.
    ///
    /// # Errors
    ///
    /// Returns an error if an index file exists but cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(INDEX_FILE);
        let index = if path.is_file() {
            let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let index: IndexFile = serde_json::from_str(&raw)?;
            info!("Loaded {} chunks from {}", index.points.len(), path.display());
            index
        } else {
            IndexFile::default()
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            index: RwLock::new(index),
        })
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn persist(&self, index: &IndexFile) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let target = self.index_path();
        let tmp = self.dir.join(format!("{INDEX_FILE}.tmp"));
        let bytes = serde_json::to_vec(index)?;
        fs::write(&tmp, bytes).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &target).map_err(io_error(&target))?;
        Ok(())
    }
}

impl VectorStore for LocalStore {
    async fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.index_path().is_file())
    }

    async fn add(&self, points: Vec<EmbeddedChunk>) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }
        let mut index = self
            .index
            .write()
            .map_err(|e| StoreError::Upsert(e.to_string()))?;

        let expected = index.dimension.unwrap_or(points[0].vector.len());
        if let Some(bad) = points.iter().find(|p| p.vector.len() != expected) {
            return Err(StoreError::Dimension {
                expected,
                got: bad.vector.len(),
            });
        }

        let mut next = IndexFile {
            dimension: Some(expected),
            points: index.points.clone(),
        };
        let added = points.len();
        for point in points {
            match next.points.iter_mut().find(|p| p.id == point.id) {
                Some(existing) => *existing = point,
                None => next.points.push(point),
            }
        }

        // Memory only moves forward once the file is written.
        self.persist(&next)?;
        *index = next;
        info!(
            "Local store now holds {} chunks after writing {added}",
            index.points.len()
        );
        Ok(())
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<usize, StoreError> {
        if sources.is_empty() {
            return Ok(0);
        }
        let mut index = self
            .index
            .write()
            .map_err(|e| StoreError::Delete(e.to_string()))?;
        let mut next = IndexFile {
            dimension: index.dimension,
            points: index.points.clone(),
        };
        next.points
            .retain(|p| !p.chunk.source().is_some_and(|s| sources.iter().any(|x| x == s)));
        let removed = index.points.len() - next.points.len();
        if removed > 0 {
            self.persist(&next)?;
            *index = next;
        }
        Ok(removed)
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|e| StoreError::Search(e.to_string()))?;
        if let Some(expected) = index.dimension {
            if expected != vector.len() {
                return Err(StoreError::Dimension {
                    expected,
                    got: vector.len(),
                });
            }
        }
        let mut scored: Vec<ScoredChunk> = index
            .points
            .iter()
            .map(|p| ScoredChunk {
                chunk: p.chunk.clone(),
                score: cosine_similarity(vector, &p.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|e| StoreError::Search(e.to_string()))?;
        Ok(index.points.len())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.display().to_string();
    move |source| StoreError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chunk, Document};

    fn point(source: &str, text: &str, position: usize, vector: Vec<f32>) -> EmbeddedChunk {
        let chunk = Chunk {
            text: text.to_string(),
            metadata: Document::new("", source).metadata,
        };
        EmbeddedChunk::new(chunk, position, vector)
    }

    #[tokio::test]
    async fn open_does_not_create_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        let store = LocalStore::open(&db).unwrap();
        assert!(!store.exists().await.unwrap());
        store.add(Vec::new()).await.unwrap();
        assert!(!db.exists());
    }

    #[tokio::test]
    async fn add_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        let store = LocalStore::open(&db).unwrap();
        store
            .add(vec![
                point("a.md", "alpha", 0, vec![1.0, 0.0]),
                point("b.md", "beta", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        assert!(db.join(INDEX_FILE).is_file());

        let reopened = LocalStore::open(&db).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        let hits = reopened.search(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "alpha");
    }

    #[tokio::test]
    async fn same_id_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .add(vec![point("a.md", "alpha", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .add(vec![point("a.md", "alpha", 0, vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .add(vec![point("a.md", "alpha", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = store
            .add(vec![point("b.md", "beta", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Dimension { expected: 2, got: 3 }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_sources_removes_only_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .add(vec![
                point("a.md", "alpha one", 0, vec![1.0, 0.0]),
                point("a.md", "alpha two", 1, vec![1.0, 0.1]),
                point("b.md", "beta", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let removed = store.delete_sources(&["a.md".to_string()]).await.unwrap();
        assert_eq!(removed, 2);
        let reopened = LocalStore::open(dir.path()).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
