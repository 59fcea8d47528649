//! One ingestion pass: scan, chunk, index, then record what was indexed.

use std::path::PathBuf;

use log::{error, info, warn};
use notewell_common::{EmbedError, Embedder, Settings, StoreError, VectorStore};

use crate::ledger::Ledger;
use crate::loader::{DocumentLoader, ExtensionLoader};
use crate::repository::{DocumentRepository, IndexError, IndexReport};
use crate::scanner::{DocumentScanner, ExtensionFilter};
use crate::splitter::{self, SplitError, TextSplitter};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid splitter configuration: {0}")]
    Splitter(#[from] SplitError),
    #[error("could not construct embedding function: {0}")]
    Embedder(#[source] EmbedError),
    #[error("could not open vector store: {0}")]
    Store(#[source] StoreError),
    #[error("indexing failed; ledger left unchanged: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// Nothing new or modified was found.
    UpToDate,
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub files_seen: usize,
    pub files_loaded: usize,
    pub files_failed: usize,
    pub chunks: usize,
    pub index: IndexReport,
    /// False when the ledger could not be written; the next run will then
    /// reprocess this run's files.
    pub ledger_saved: bool,
}

pub struct IngestionPipeline<L> {
    source_dir: PathBuf,
    ledger_path: PathBuf,
    scanner: DocumentScanner<L>,
    splitter: Box<dyn TextSplitter>,
    batch_size: usize,
    replace_sources: bool,
}

impl IngestionPipeline<ExtensionLoader> {
    /// # Errors
    ///
    /// Returns an error if the chunking parameters are invalid.
    pub fn from_settings(settings: &Settings) -> Result<Self, IngestError> {
        let filter = ExtensionFilter::new(&settings.extensions);
        Self::new(settings, DocumentScanner::new(ExtensionLoader, filter))
    }
}

impl<L: DocumentLoader> IngestionPipeline<L> {
    /// # Errors
    ///
    /// Returns an error if the chunking parameters are invalid.
    pub fn new(settings: &Settings, scanner: DocumentScanner<L>) -> Result<Self, IngestError> {
        Ok(Self {
            source_dir: settings.source_dir.clone(),
            ledger_path: settings.ledger_path.clone(),
            scanner,
            splitter: splitter::from_settings(settings)?,
            batch_size: settings.embedding_batch_size,
            replace_sources: settings.replace_modified_sources,
        })
    }

    /// Runs one pass. The embedder and the store are only built once there
    /// is something to index, the embedder first so that a broken model
    /// aborts before the store is touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedder or store cannot be constructed or
    /// indexing fails. The ledger is not advanced in any of these cases.
    pub async fn run<S, E, FE, FS>(
        &self,
        make_embedder: FE,
        open_store: FS,
    ) -> Result<IngestReport, IngestError>
    where
        S: VectorStore,
        E: Embedder,
        FE: FnOnce() -> Result<E, EmbedError>,
        FS: FnOnce() -> Result<S, StoreError>,
    {
        let mut ledger = Ledger::load(&self.ledger_path);
        info!("Ledger holds {} processed file(s).", ledger.len());

        let scan = self.scanner.scan(&self.source_dir, &ledger);
        let mut report = IngestReport {
            status: IngestStatus::UpToDate,
            files_seen: scan.files_seen,
            files_loaded: scan.pending.len(),
            files_failed: scan.failures.len(),
            chunks: 0,
            index: IndexReport::default(),
            ledger_saved: false,
        };
        if scan.documents.is_empty() && scan.pending.is_empty() {
            info!("No new or modified documents to process.");
            return Ok(report);
        }

        let chunks = self.splitter.split_documents(scan.documents);
        report.chunks = chunks.len();
        info!("Split into {} chunk(s).", chunks.len());

        if chunks.is_empty() {
            info!("Loaded files contain no text; nothing to index.");
        } else {
            let embedder = make_embedder().map_err(|e| {
                error!("Failed to construct embedding function: {e}");
                IngestError::Embedder(e)
            })?;
            let store = open_store().map_err(|e| {
                error!("Failed to open vector store: {e}");
                IngestError::Store(e)
            })?;
            let repository = DocumentRepository::new(store, embedder)
                .with_batch_size(self.batch_size)
                .with_source_replacement(self.replace_sources);
            report.index = repository.add_chunks(chunks).await?;
        }

        ledger.merge(scan.pending);
        report.status = IngestStatus::Indexed;
        match ledger.save(&self.ledger_path) {
            Ok(()) => {
                report.ledger_saved = true;
                info!(
                    "Ledger updated at {} ({} file(s)).",
                    self.ledger_path.display(),
                    ledger.len()
                );
            }
            Err(e) => warn!("Failed to save ledger: {e}; these files will be reprocessed next run"),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_common::mock::{MockEmbedder, MockStore};
    use std::fs;

    fn settings(root: &std::path::Path) -> Settings {
        Settings {
            source_dir: root.join("Documents"),
            ledger_path: root.join("processed_files.json"),
            chunk_size: 50,
            chunk_overlap: 10,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn embedder_failure_is_fatal_before_store_opens() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.source_dir).unwrap();
        fs::write(settings.source_dir.join("a.md"), "alpha").unwrap();

        let pipeline = IngestionPipeline::from_settings(&settings).unwrap();
        let mut opened = false;
        let err = pipeline
            .run(
                || Err::<MockEmbedder, _>(EmbedError::Init("no model".into())),
                || {
                    opened = true;
                    Ok(MockStore::default())
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedder(_)));
        assert!(!opened);
        assert!(!settings.ledger_path.exists());
    }

    #[tokio::test]
    async fn blank_files_are_recorded_without_building_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        fs::create_dir_all(&settings.source_dir).unwrap();
        fs::write(settings.source_dir.join("empty.md"), "\n\n").unwrap();

        let pipeline = IngestionPipeline::from_settings(&settings).unwrap();
        let report = pipeline
            .run(
                || Err::<MockEmbedder, _>(EmbedError::Init("unused".into())),
                || Err::<MockStore, _>(StoreError::Connection("unused".into())),
            )
            .await
            .unwrap();
        assert_eq!(report.status, IngestStatus::Indexed);
        assert_eq!(report.chunks, 0);
        assert!(report.ledger_saved);
        assert_eq!(Ledger::load(&settings.ledger_path).len(), 1);
    }

    #[tokio::test]
    async fn invalid_chunking_is_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            chunk_size: 10,
            chunk_overlap: 10,
            ..settings(dir.path())
        };
        assert!(matches!(
            IngestionPipeline::from_settings(&settings),
            Err(IngestError::Splitter(_))
        ));
    }
}
