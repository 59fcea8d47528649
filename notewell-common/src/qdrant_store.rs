use log::{info, warn};
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    value::Kind,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;

use crate::model::{Chunk, EmbeddedChunk, Metadata, SOURCE_KEY, ScoredChunk};
use crate::store::{StoreError, VectorStore};

const TEXT_KEY: &str = "text";
const METADATA_KEY: &str = "metadata";

/// Chunks stored as points of a single Qdrant collection.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// # Errors
    ///
    /// Returns an error if the client cannot be built from `url`.
    pub fn connect(url: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<(), StoreError> {
        if self.exists().await? {
            return Ok(());
        }
        info!("Creating collection '{}'.", self.collection);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.clone())
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }

    fn source_filter(sources: &[String]) -> Filter {
        Filter::should(
            sources
                .iter()
                .map(|s| Condition::matches(SOURCE_KEY, s.clone())),
        )
    }
}

fn to_point(point: EmbeddedChunk) -> Result<PointStruct, StoreError> {
    let source = point.chunk.source().map(str::to_string);
    let payload: Payload = json!({
        TEXT_KEY: point.chunk.text,
        SOURCE_KEY: source,
        METADATA_KEY: point.chunk.metadata,
    })
    .try_into()
    .map_err(|e: qdrant_client::QdrantError| StoreError::Upsert(e.to_string()))?;
    Ok(PointStruct::new(point.id, point.vector, payload))
}

fn from_scored(point: ScoredPoint) -> ScoredChunk {
    let mut text = String::new();
    let mut metadata = Metadata::new();
    for (key, value) in point.payload {
        match (key.as_str(), value.kind) {
            (TEXT_KEY, Some(Kind::StringValue(s))) => text = s,
            (METADATA_KEY, Some(Kind::StructValue(fields))) => {
                for (k, v) in fields.fields {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        metadata.insert(k, s);
                    }
                }
            }
            (SOURCE_KEY, Some(Kind::StringValue(s))) => {
                metadata.entry(SOURCE_KEY.to_string()).or_insert(s);
            }
            _ => {}
        }
    }
    ScoredChunk {
        chunk: Chunk { text, metadata },
        score: point.score,
    }
}

impl VectorStore for QdrantStore {
    async fn exists(&self) -> Result<bool, StoreError> {
        self.client
            .collection_exists(self.collection.clone())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn add(&self, points: Vec<EmbeddedChunk>) -> Result<(), StoreError> {
        let Some(first) = points.first() else {
            return Ok(());
        };
        self.ensure_collection(first.vector.len() as u64).await?;

        let points = points
            .into_iter()
            .map(to_point)
            .collect::<Result<Vec<_>, _>>()?;
        info!("Upserting {} points to Qdrant.", points.len());
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
            .await
            .map_err(|e| StoreError::Upsert(e.to_string()))?;
        Ok(())
    }

    async fn delete_sources(&self, sources: &[String]) -> Result<usize, StoreError> {
        if sources.is_empty() || !self.exists().await? {
            return Ok(0);
        }
        let filter = Self::source_filter(sources);
        let matching = self
            .client
            .count(
                CountPointsBuilder::new(self.collection.clone())
                    .filter(filter.clone())
                    .exact(true),
            )
            .await
            .map_err(|e| StoreError::Delete(e.to_string()))?
            .result
            .map_or(0, |r| r.count);
        if matching == 0 {
            return Ok(0);
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection.clone())
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| StoreError::Delete(e.to_string()))?;
        Ok(usize::try_from(matching).unwrap_or(usize::MAX))
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, StoreError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| StoreError::Search(e.to_string()))?;
        Ok(response.result.into_iter().map(from_scored).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        if !self.exists().await? {
            warn!("Collection '{}' does not exist yet.", self.collection);
            return Ok(0);
        }
        let count = self
            .client
            .count(CountPointsBuilder::new(self.collection.clone()).exact(true))
            .await
            .map_err(|e| StoreError::Search(e.to_string()))?
            .result
            .map_or(0, |r| r.count);
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }
}
