pub mod config;
pub mod embedding;
pub mod local_store;
pub mod logging;
pub mod model;
pub mod qdrant_store;
pub mod store;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{ConfigError, Settings, SplitterKind, StoreKind};
pub use embedding::{EmbedError, Embedder, FastEmbedder};
pub use model::{Chunk, Document, EmbeddedChunk, ScoredChunk};
pub use store::{AnyStore, StoreError, VectorStore};
