pub mod ingest;
pub mod ledger;
pub mod loader;
pub mod repository;
pub mod scanner;
pub mod splitter;

use log::info;
use notewell_common::{AnyStore, FastEmbedder, Settings};

pub use ingest::{IngestError, IngestReport, IngestStatus, IngestionPipeline};
pub use ledger::Ledger;

/// One ingestion pass with the configured embedding model and store.
///
/// # Errors
///
/// See [`IngestionPipeline::run`].
pub async fn ingest(settings: &Settings) -> Result<IngestReport, IngestError> {
    info!(
        "Ingesting {} into {:?} store",
        settings.source_dir.display(),
        settings.store
    );
    let pipeline = IngestionPipeline::from_settings(settings)?;
    pipeline
        .run(
            || FastEmbedder::new(&settings.embedding_model, Some(settings.embedding_batch_size)),
            || AnyStore::open(settings),
        )
        .await
}
