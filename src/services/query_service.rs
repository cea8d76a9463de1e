//! Read side: equality-filtered and unfiltered listings.

use super::{ServiceError, ServiceResult, metadata_store::MetadataStore};
use crate::models::{
    contact::ContactMessage,
    document::{Collection, Document},
    upload::{CATEGORY_FIELD, UploadRecord},
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct QueryService {
    metadata: Arc<dyn MetadataStore>,
}

impl QueryService {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Uploads in `collection`, restricted to `category` when one is given.
    pub async fn uploads(
        &self,
        collection: Collection,
        category: Option<&str>,
    ) -> ServiceResult<Vec<UploadRecord>> {
        let docs = self.documents(collection, category).await?;
        debug!(%collection, ?category, count = docs.len(), "listing uploads");
        decode_all(&docs, UploadRecord::from_document)
    }

    pub async fn contacts(&self) -> ServiceResult<Vec<ContactMessage>> {
        let docs = self.documents(Collection::Contacts, None).await?;
        decode_all(&docs, ContactMessage::from_document)
    }

    async fn documents(
        &self,
        collection: Collection,
        category: Option<&str>,
    ) -> ServiceResult<Vec<Document>> {
        let result = match category {
            Some(value) => {
                self.metadata
                    .query_equal(collection, CATEGORY_FIELD, value)
                    .await
            }
            None => self.metadata.list_all(collection).await,
        };
        result.map_err(ServiceError::Query)
    }
}

fn decode_all<T>(
    docs: &[Document],
    decode: impl Fn(&Document) -> Result<T, serde_json::Error>,
) -> ServiceResult<Vec<T>> {
    docs.iter()
        .map(|doc| {
            decode(doc).map_err(|source| {
                ServiceError::Query(super::metadata_store::MetadataError::Malformed {
                    id: doc.id.clone(),
                    source,
                })
            })
        })
        .collect()
}
