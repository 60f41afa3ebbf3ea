//! Index engine seam
//!
//! The host treats the engine as an opaque capability: build an index from
//! documents, restore one from a persisted image, answer questions, accept
//! inserts, produce a snapshot. Everything behind these traits is replaceable;
//! the default is the keyword engine below.

pub mod keyword;
pub mod tokenize;

pub use keyword::KeywordEngine;

use anyhow::Result;

use crate::types::Document;

/// In-memory reference to a constructed, queryable index.
///
/// Never crosses the process boundary; the host mutates it in place under its
/// lock and persists snapshots of it.
pub trait IndexHandle: Send {
    /// Answer a natural-language question with a short passage
    fn answer(&self, question: &str) -> Result<String>;

    /// Insert a document, replacing any existing document with the same id
    fn insert(&mut self, document: Document) -> Result<()>;

    /// Serialize the full index state for durable storage
    fn snapshot(&self) -> Result<Vec<u8>>;

    /// Number of documents currently indexed
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Factory for index handles
pub trait IndexEngine: Send + Sync {
    /// Build a fresh index from a document corpus
    fn build(&self, documents: Vec<Document>) -> Result<Box<dyn IndexHandle>>;

    /// Reconstruct an index from a persisted snapshot
    fn restore(&self, image: &[u8]) -> Result<Box<dyn IndexHandle>>;
}
