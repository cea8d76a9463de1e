//! Shared fixtures for unit tests: an in-memory metadata store and store
//! wrappers that count calls and can be switched into failure.

use crate::{
    models::document::{Collection, Document},
    services::{
        blob_store::{BlobError, BlobHandle, BlobInfo, BlobResult, BlobStore, UrlExpiry},
        metadata_store::{MetadataError, MetadataResult, MetadataStore, SqliteMetadataStore},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::fs::File;

/// Single-connection in-memory SQLite store with the schema applied.
pub async fn memory_metadata_store() -> SqliteMetadataStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let store = SqliteMetadataStore::new(Arc::new(pool));
    store.migrate().await.expect("migrate");
    store
}

pub struct CountingBlobStore {
    inner: Arc<dyn BlobStore>,
    pub calls: AtomicUsize,
    pub fail_puts: AtomicBool,
}

impl CountingBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_puts: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> BlobResult<BlobHandle> {
        self.hit();
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Io(io::Error::new(
                io::ErrorKind::StorageFull,
                "quota exceeded",
            )));
        }
        self.inner.put(key, bytes, content_type).await
    }

    async fn read_url(&self, handle: &BlobHandle, expiry: UrlExpiry) -> BlobResult<String> {
        self.hit();
        self.inner.read_url(handle, expiry).await
    }

    async fn open(&self, key: &str) -> BlobResult<(BlobInfo, File)> {
        self.hit();
        self.inner.open(key).await
    }

    async fn list(&self) -> BlobResult<Vec<BlobInfo>> {
        self.hit();
        self.inner.list().await
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.hit();
        self.inner.delete(key).await
    }

    async fn health_check(&self) -> BlobResult<()> {
        self.inner.health_check().await
    }
}

pub struct CountingMetadataStore {
    inner: Arc<dyn MetadataStore>,
    pub calls: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl CountingMetadataStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn outage() -> MetadataError {
        MetadataError::Sqlx(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl MetadataStore for CountingMetadataStore {
    async fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> MetadataResult<Document> {
        self.hit();
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.insert(collection, fields).await
    }

    async fn query_equal(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> MetadataResult<Vec<Document>> {
        self.hit();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.query_equal(collection, field, value).await
    }

    async fn list_all(&self, collection: Collection) -> MetadataResult<Vec<Document>> {
        self.hit();
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.list_all(collection).await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
