//! Store capabilities and the workflows built on them.

pub mod blob_store;
pub mod contact_service;
pub mod ingest_service;
pub mod metadata_store;
pub mod query_service;
pub mod reconcile_service;

use blob_store::BlobError;
use metadata_store::MetadataError;
use thiserror::Error;

/// Failures surfaced by the ingest, contact and query workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("failed to store upload")]
    StorageWrite(#[source] BlobError),
    #[error("failed to save record")]
    MetadataWrite(#[source] MetadataError),
    #[error("failed to fetch records")]
    Query(#[source] MetadataError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
