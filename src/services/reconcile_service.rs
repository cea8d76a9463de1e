//! Orphan sweep: deletes blobs that no upload record references.
//!
//! Ingest writes the blob before its record, so a blob younger than the grace
//! period may belong to an ingest that is still in flight and is left alone.

use super::{
    blob_store::{BlobError, BlobStore},
    metadata_store::{MetadataError, MetadataStore},
};
use crate::models::{document::Collection, upload::BLOB_KEY_FIELD};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("listing blobs: {0}")]
    Blobs(#[from] BlobError),
    #[error("listing records: {0}")]
    Metadata(#[from] MetadataError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub referenced: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct ReconcileService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    grace: Duration,
}

impl ReconcileService {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>, grace: Duration) -> Self {
        Self {
            blobs,
            metadata,
            grace,
        }
    }

    pub async fn sweep_orphans(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let mut referenced = HashSet::new();
        for collection in Collection::UPLOADS {
            for doc in self.metadata.list_all(collection).await? {
                if let Some(key) = doc.field_str(BLOB_KEY_FIELD) {
                    referenced.insert(key.to_string());
                }
            }
        }

        let cutoff = now - self.grace;
        let mut report = SweepReport {
            referenced: referenced.len(),
            ..SweepReport::default()
        };
        for blob in self.blobs.list().await? {
            report.scanned += 1;
            if referenced.contains(&blob.key) || blob.created_at > cutoff {
                continue;
            }
            match self.blobs.delete(&blob.key).await {
                Ok(()) => {
                    info!(key = %blob.key, "deleted orphaned blob");
                    report.deleted += 1;
                }
                Err(err) => {
                    warn!(key = %blob.key, error = %err, "failed to delete orphaned blob");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
