//! Core types for corpusd

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a document
pub type DocumentId = String;

/// A unit of ingested content.
///
/// Owned by the index host once accepted by an insert; the id is derived
/// unless the caller supplies one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Where the content came from (a file path for local ingestion)
    pub source: String,
    pub title: Option<String>,
    pub text: String,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a freshly derived id
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            title: None,
            text: text.into(),
            ingested_at: Utc::now(),
        }
    }

    /// Override the derived id with a caller-supplied one
    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}
