use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SOURCE_KEY: &str = "source";

pub type Metadata = BTreeMap<String, String>;

/// Loaded file content. Never persisted by the ingestion side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A bounded slice of a document's text, carrying the document's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A chunk paired with its embedding, ready to be written to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl EmbeddedChunk {
    /// Ids are stable for the same source, position and text, so re-adding an
    /// identical chunk overwrites instead of duplicating on upserting stores.
    pub fn new(chunk: Chunk, position: usize, vector: Vec<f32>) -> Self {
        let key = format!(
            "{}#{position}#{}",
            chunk.source().unwrap_or_default(),
            chunk.text
        );
        let id = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, key.as_bytes()).to_string();
        Self { id, vector, chunk }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
