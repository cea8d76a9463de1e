//! src/services/ingest_service.rs
//!
//! The upload-and-index workflow: validate, derive a storage key, write the
//! blob, obtain its read URL, then index it in the metadata store. The two
//! writes are not atomic; a metadata failure leaves an unindexed blob for the
//! orphan sweep to collect.

use super::{
    ServiceError, ServiceResult,
    blob_store::{BlobStore, UrlExpiry},
    metadata_store::MetadataStore,
};
use crate::models::{
    document::{Collection, to_fields},
    upload::{UploadFields, is_video},
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// The file part of an upload request.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// A parsed upload request, before validation.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub collection: Collection,
    pub category: Option<String>,
    pub display_name: Option<String>,
    pub title: Option<String>,
    pub file: Option<FilePart>,
}

/// What a successful ingest hands back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub id: String,
    pub url: String,
}

#[derive(Clone)]
pub struct IngestService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    max_upload_bytes: usize,
}

impl IngestService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            blobs,
            metadata,
            max_upload_bytes,
        }
    }

    /// Run the full ingest. Validation happens before any store call.
    pub async fn ingest(&self, req: UploadRequest) -> ServiceResult<IngestReceipt> {
        let file = match req.file {
            Some(file) if !file.bytes.is_empty() => file,
            _ => return Err(ServiceError::validation("no file supplied")),
        };
        if file.bytes.len() > self.max_upload_bytes {
            return Err(ServiceError::PayloadTooLarge {
                limit: self.max_upload_bytes,
            });
        }
        let category = required(req.category, category_label(req.collection))?;
        let display_name = required(req.display_name, name_label(req.collection))?;
        let title = req.title.filter(|t| !t.trim().is_empty());

        let content_type = file.content_type.filter(|ct| !ct.trim().is_empty());
        let key = storage_key(
            req.collection,
            &category,
            &display_name,
            file.filename.as_deref(),
            content_type.as_deref(),
            Utc::now().timestamp_millis(),
        );

        let handle = self
            .blobs
            .put(&key, file.bytes, content_type.as_deref())
            .await
            .map_err(ServiceError::StorageWrite)?;
        let url = self
            .blobs
            .read_url(&handle, UrlExpiry::Never)
            .await
            .map_err(ServiceError::StorageWrite)?;

        let fields = UploadFields {
            category,
            display_name,
            title,
            media_url: url.clone(),
            is_video: is_video(content_type.as_deref()),
            content_type,
            blob_key: handle.key,
        };
        let fields = to_fields(&fields)
            .map_err(|err| ServiceError::MetadataWrite(err.into()))?;
        let doc = self
            .metadata
            .insert(req.collection, fields)
            .await
            .map_err(ServiceError::MetadataWrite)?;

        info!(collection = %req.collection, id = %doc.id, key = %key, "upload indexed");
        Ok(IngestReceipt { id: doc.id, url })
    }
}

fn required(value: Option<String>, label: &str) -> ServiceResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::validation(format!("missing field `{}`", label)))
}

fn category_label(collection: Collection) -> &'static str {
    match collection {
        Collection::Gallery => "date",
        _ => "day",
    }
}

fn name_label(collection: Collection) -> &'static str {
    match collection {
        Collection::Gallery => "title",
        _ => "name",
    }
}

/// `{collection}/{category}/{name}_{millis}.{ext}` with every component
/// reduced to `[A-Za-z0-9._-]`.
pub fn storage_key(
    collection: Collection,
    category: &str,
    display_name: &str,
    filename: Option<&str>,
    content_type: Option<&str>,
    millis: i64,
) -> String {
    format!(
        "{}/{}/{}_{}.{}",
        collection.as_str(),
        sanitize_component(category),
        sanitize_component(display_name),
        millis,
        extension(filename, content_type)
    )
}

fn sanitize_component(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    while out.contains("..") {
        out = out.replace("..", "_");
    }
    let out = out.trim_matches('.').to_string();
    if out.is_empty() { "_".to_string() } else { out }
}

/// Extension from the original filename, else the content-type subtype.
fn extension(filename: Option<&str>, content_type: Option<&str>) -> String {
    let valid = |ext: &str| {
        !ext.is_empty()
            && ext.len() <= MAX_EXTENSION_LEN
            && ext.chars().all(|c| c.is_ascii_alphanumeric())
    };

    if let Some(ext) = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| valid(ext))
    {
        return ext.to_ascii_lowercase();
    }

    content_type
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| ct.trim().split_once('/'))
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or(subtype))
        .filter(|sub| valid(sub))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
