//! Index service
//!
//! Owns the single mutable index handle and serializes every operation on it
//! behind one async mutex: at most one query or insert runs system-wide at
//! any instant, and an insert's persistence completes before the lock is
//! released. The service is an explicit object (no ambient globals) so tests
//! construct isolated instances against temp directories.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::engine::{IndexEngine, IndexHandle};
use crate::ingest::{self, IngestError};
use crate::types::DocumentId;

use super::persistence::ImageStore;

/// Failures surfaced by index operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("index is not ready; insert a document first")]
    NotReady,

    #[error("failed to load document: {0}")]
    DocumentLoad(String),

    #[error("failed to persist index image: {0}")]
    Persistence(String),

    #[error("index engine error: {0}")]
    Engine(String),
}

impl From<IngestError> for ServiceError {
    fn from(e: IngestError) -> Self {
        ServiceError::DocumentLoad(e.to_string())
    }
}

/// Operation counters, reported at shutdown
#[derive(Debug, Default, Clone, Copy)]
pub struct ServiceStats {
    pub queries: u64,
    pub inserts: u64,
}

/// The process-wide owner of the index handle
pub struct IndexService {
    engine: Box<dyn IndexEngine>,
    store: ImageStore,
    bootstrap_dir: Option<PathBuf>,
    index: Mutex<Option<Box<dyn IndexHandle>>>,
    stats: RwLock<ServiceStats>,
}

impl IndexService {
    pub fn new(engine: Box<dyn IndexEngine>, data_dir: &Path, bootstrap_dir: Option<PathBuf>) -> Self {
        Self {
            engine,
            store: ImageStore::new(data_dir),
            bootstrap_dir,
            index: Mutex::new(None),
            stats: RwLock::new(ServiceStats::default()),
        }
    }

    /// Recover the persisted image, or build a fresh index from the bootstrap
    /// corpus, or stay empty. Holds the lock for the whole load-or-build so
    /// no concurrent operation can observe a partially constructed handle.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        let mut index = self.index.lock().await;

        if self.store.exists() {
            info!("Loading existing index from: {}", self.store.dir().display());
            let image = self.store.load()?;
            let handle = self.engine.restore(&image)?;
            info!("Index recovered with {} documents", handle.len());
            *index = Some(handle);
            return Ok(());
        }

        let Some(corpus_dir) = self.bootstrap_dir.as_deref() else {
            info!("No persisted index and no bootstrap corpus; starting empty");
            return Ok(());
        };

        match ingest::load_path(corpus_dir) {
            Ok(documents) => {
                info!(
                    "Building new index from {} bootstrap documents in '{}'",
                    documents.len(),
                    corpus_dir.display()
                );
                let handle = self.engine.build(documents)?;
                self.store.save(&handle.snapshot()?, handle.len())?;
                *index = Some(handle);
            }
            Err(e) => {
                // Non-fatal: the host still serves, answering NotReady
                info!("No bootstrap corpus loaded ({}); starting empty", e);
            }
        }
        Ok(())
    }

    /// Answer a query against the current handle
    pub async fn query(&self, text: &str) -> Result<String, ServiceError> {
        let index = self.index.lock().await;
        let handle = index.as_ref().ok_or(ServiceError::NotReady)?;

        let answer = handle
            .answer(text)
            .map_err(|e| ServiceError::Engine(e.to_string()))?;
        self.stats.write().queries += 1;
        Ok(answer)
    }

    /// Load a document from `path` and insert it, persisting the updated
    /// image before the lock is released.
    ///
    /// The document is loaded before the lock is taken, so a load failure
    /// cannot mutate anything. A persistence failure after a successful
    /// in-memory insert is surfaced but not rolled back: the in-memory index
    /// runs ahead of disk until the next successful persist.
    pub async fn insert(
        &self,
        path: &Path,
        doc_id: Option<String>,
    ) -> Result<DocumentId, ServiceError> {
        let mut document = ingest::load_file(path)?;
        if let Some(id) = doc_id {
            document = document.with_id(id);
        }
        let document_id = document.id.clone();

        let mut index = self.index.lock().await;
        match index.as_mut() {
            Some(handle) => {
                handle
                    .insert(document)
                    .map_err(|e| ServiceError::Engine(e.to_string()))?;
            }
            None => {
                info!("Index is empty; building a new one from the inserted document");
                let handle = self
                    .engine
                    .build(vec![document])
                    .map_err(|e| ServiceError::Engine(e.to_string()))?;
                *index = Some(handle);
            }
        }
        self.stats.write().inserts += 1;

        let handle = index.as_ref().expect("handle exists after insert");
        let persisted = handle
            .snapshot()
            .and_then(|snapshot| self.store.save(&snapshot, handle.len()));
        if let Err(e) = persisted {
            error!(
                "Index image persist failed after insert of '{}': {:#}. \
                 In-memory state is ahead of disk until the next successful persist.",
                document_id, e
            );
            return Err(ServiceError::Persistence(e.to_string()));
        }

        Ok(document_id)
    }

    /// Number of indexed documents, or None before the index exists
    pub async fn document_count(&self) -> Option<usize> {
        self.index.lock().await.as_ref().map(|h| h.len())
    }

    /// Snapshot of the operation counters
    pub fn stats(&self) -> ServiceStats {
        *self.stats.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::KeywordEngine;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(data_dir: &Path) -> IndexService {
        IndexService::new(Box::new(KeywordEngine), data_dir, None)
    }

    fn write_doc(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn query_before_any_data_is_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let svc = service(temp_dir.path());
        svc.initialize().await.unwrap();

        let err = svc.query("anything").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotReady));
    }

    #[tokio::test]
    async fn insert_then_query_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let doc = write_doc(&temp_dir, "a.txt", "hello");
        let svc = service(temp_dir.path());
        svc.initialize().await.unwrap();

        svc.insert(&doc, None).await.unwrap();
        let answer = svc.query("what does a.txt say?").await.unwrap();
        assert!(!answer.is_empty());
        assert!(answer.contains("hello"));
    }

    #[tokio::test]
    async fn failed_insert_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let doc = write_doc(&temp_dir, "a.txt", "hello");
        let svc = service(temp_dir.path());
        svc.initialize().await.unwrap();
        svc.insert(&doc, None).await.unwrap();
        let before = svc.query("hello").await.unwrap();

        let err = svc
            .insert(&temp_dir.path().join("missing.txt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DocumentLoad(_)));

        assert_eq!(svc.document_count().await, Some(1));
        assert_eq!(svc.query("hello").await.unwrap(), before);
    }

    #[tokio::test]
    async fn persisted_image_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        let doc = write_doc(&temp_dir, "facts.txt", "The sky is blue.");

        let before = {
            let svc = service(temp_dir.path());
            svc.initialize().await.unwrap();
            svc.insert(&doc, Some("facts".into())).await.unwrap();
            svc.query("what color is the sky?").await.unwrap()
        };

        let svc = service(temp_dir.path());
        svc.initialize().await.unwrap();
        assert_eq!(svc.document_count().await, Some(1));
        assert_eq!(svc.query("what color is the sky?").await.unwrap(), before);
    }

    #[tokio::test]
    async fn loading_one_image_twice_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let doc = write_doc(&temp_dir, "facts.txt", "Water boils at one hundred degrees.");
        {
            let svc = service(temp_dir.path());
            svc.initialize().await.unwrap();
            svc.insert(&doc, None).await.unwrap();
        }

        let first = service(temp_dir.path());
        first.initialize().await.unwrap();
        let second = service(temp_dir.path());
        second.initialize().await.unwrap();

        let question = "when does water boil?";
        assert_eq!(
            first.query(question).await.unwrap(),
            second.query(question).await.unwrap()
        );
    }

    #[tokio::test]
    async fn bootstrap_corpus_builds_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let corpus = temp_dir.path().join("data");
        std::fs::create_dir_all(&corpus).unwrap();
        std::fs::write(corpus.join("a.txt"), "alpha content").unwrap();
        std::fs::write(corpus.join("b.txt"), "beta content").unwrap();

        let svc = IndexService::new(
            Box::new(KeywordEngine),
            temp_dir.path(),
            Some(corpus.clone()),
        );
        svc.initialize().await.unwrap();
        assert_eq!(svc.document_count().await, Some(2));

        // The freshly built index was persisted: a second service recovers it
        // even without the corpus directory.
        std::fs::remove_dir_all(&corpus).unwrap();
        let recovered = service(temp_dir.path());
        recovered.initialize().await.unwrap();
        assert_eq!(recovered.document_count().await, Some(2));
    }

    #[tokio::test]
    async fn missing_bootstrap_corpus_is_non_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let svc = IndexService::new(
            Box::new(KeywordEngine),
            temp_dir.path(),
            Some(temp_dir.path().join("no-such-dir")),
        );
        svc.initialize().await.unwrap();
        assert_eq!(svc.document_count().await, None);
    }

    #[tokio::test]
    async fn concurrent_operations_serialize_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let seed = write_doc(&temp_dir, "seed.txt", "seed content");
        let svc = Arc::new(service(temp_dir.path()));
        svc.initialize().await.unwrap();
        svc.insert(&seed, None).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let path = write_doc(&temp_dir, &format!("doc{i}.txt"), &format!("content {i}"));
            let svc_insert = svc.clone();
            tasks.push(tokio::spawn(async move {
                svc_insert.insert(&path, Some(format!("doc{i}"))).await.unwrap();
            }));
            let svc_query = svc.clone();
            tasks.push(tokio::spawn(async move {
                // Must always be a complete answer, never a torn state
                let answer = svc_query.query("content").await.unwrap();
                assert!(!answer.is_empty());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(svc.document_count().await, Some(9));
        let stats = svc.stats();
        assert_eq!(stats.inserts, 9);
        assert_eq!(stats.queries, 8);
    }
}
