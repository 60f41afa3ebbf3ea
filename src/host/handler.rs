//! Request handler
//!
//! Dispatches decoded requests to the index service and maps service errors
//! onto wire error codes. A single bad call never takes the host down: every
//! failure becomes an error response with a short human-readable reason.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::protocol::{ErrorCode, Request, Response};
use super::service::{IndexService, ServiceError};

/// Maps requests to index service operations
pub struct RequestHandler {
    service: Arc<IndexService>,
}

impl RequestHandler {
    pub fn new(service: Arc<IndexService>) -> Self {
        Self { service }
    }

    /// Handle an incoming request and return a response
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Query { text } => self.handle_query(text).await,
            Request::Insert { path, doc_id } => self.handle_insert(path, doc_id).await,
            // The server completes the handshake before dispatching here
            Request::Hello { .. } => Response::error(
                ErrorCode::InvalidRequest,
                "handshake already completed on this connection",
            ),
        }
    }

    async fn handle_query(&self, text: String) -> Response {
        debug!("Query: {:?}", text);
        match self.service.query(&text).await {
            Ok(answer) => Response::Answer { text: answer },
            Err(e) => {
                warn!("Query failed: {}", e);
                Response::error(error_code(&e), e.to_string())
            }
        }
    }

    async fn handle_insert(&self, path: String, doc_id: Option<String>) -> Response {
        debug!("Insert: {:?} (doc_id: {:?})", path, doc_id);
        match self.service.insert(&PathBuf::from(path), doc_id).await {
            Ok(doc_id) => Response::Inserted { doc_id },
            Err(e) => {
                warn!("Insert failed: {}", e);
                Response::error(error_code(&e), e.to_string())
            }
        }
    }

    /// The service behind this handler
    pub fn service(&self) -> Arc<IndexService> {
        self.service.clone()
    }
}

fn error_code(e: &ServiceError) -> ErrorCode {
    match e {
        ServiceError::NotReady => ErrorCode::NotReady,
        ServiceError::DocumentLoad(_) => ErrorCode::DocumentLoad,
        ServiceError::Persistence(_) => ErrorCode::Persistence,
        ServiceError::Engine(_) => ErrorCode::QueryFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::KeywordEngine;
    use tempfile::TempDir;

    fn handler(data_dir: &std::path::Path) -> RequestHandler {
        let service = Arc::new(IndexService::new(
            Box::new(KeywordEngine),
            data_dir,
            None,
        ));
        RequestHandler::new(service)
    }

    #[tokio::test]
    async fn query_on_empty_index_maps_to_not_ready() {
        let temp_dir = TempDir::new().unwrap();
        let handler = handler(temp_dir.path());

        let response = handler
            .handle(Request::Query {
                text: "anything".into(),
            })
            .await;
        match response {
            Response::Error { code, .. } => assert_eq!(code, ErrorCode::NotReady),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn insert_then_query_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let doc_path = temp_dir.path().join("a.txt");
        std::fs::write(&doc_path, "hello").unwrap();
        let handler = handler(temp_dir.path());

        let response = handler
            .handle(Request::Insert {
                path: doc_path.display().to_string(),
                doc_id: Some("a".into()),
            })
            .await;
        assert!(matches!(response, Response::Inserted { ref doc_id } if doc_id == "a"));

        let response = handler
            .handle(Request::Query {
                text: "what does a.txt say?".into(),
            })
            .await;
        match response {
            Response::Answer { text } => assert!(!text.is_empty()),
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn insert_of_missing_file_maps_to_document_load() {
        let temp_dir = TempDir::new().unwrap();
        let handler = handler(temp_dir.path());

        let response = handler
            .handle(Request::Insert {
                path: temp_dir.path().join("missing.txt").display().to_string(),
                doc_id: None,
            })
            .await;
        match response {
            Response::Error { code, .. } => assert_eq!(code, ErrorCode::DocumentLoad),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn late_hello_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let handler = handler(temp_dir.path());

        let response = handler
            .handle(Request::Hello {
                token: "secret".into(),
            })
            .await;
        match response {
            Response::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidRequest),
            other => panic!("expected error, got {other:?}"),
        }
    }
}
