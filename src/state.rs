//! Shared router state: process-wide store handles, built once at startup.

use crate::services::{
    blob_store::BlobStore, contact_service::ContactService, ingest_service::IngestService,
    metadata_store::MetadataStore, query_service::QueryService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestService,
    pub query: QueryService,
    pub contacts: ContactService,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            ingest: IngestService::new(blobs.clone(), metadata.clone(), max_upload_bytes),
            query: QueryService::new(metadata.clone()),
            contacts: ContactService::new(metadata.clone()),
            blobs,
            metadata,
        }
    }
}
