//! src/services/metadata_store.rs
//!
//! Metadata Store capability and its SQLite implementation. Records live in a
//! single `documents` table as JSON field maps keyed by collection; equality
//! filters go through `json_extract`.

use crate::models::document::{Collection, Document, DocumentRow};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("field name `{0}` is not queryable")]
    InvalidField(String),
    #[error("malformed record `{id}`: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Structured record storage consumed by ingest and query.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record; the store assigns its id and creation timestamp.
    async fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> MetadataResult<Document>;

    /// Records whose top-level `field` equals `value`, oldest first.
    async fn query_equal(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> MetadataResult<Vec<Document>>;

    /// Every record in the collection, oldest first.
    async fn list_all(&self, collection: Collection) -> MetadataResult<Vec<Document>>;

    /// Lightweight round-trip used by readiness.
    async fn health_check(&self) -> MetadataResult<()>;
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> MetadataResult<usize> {
        let statements = MIGRATION_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        for stmt in &statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(statements.len())
    }

    fn decode_rows(
        collection: Collection,
        rows: Vec<DocumentRow>,
    ) -> MetadataResult<Vec<Document>> {
        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.into_document(collection)
                    .map_err(|source| MetadataError::Malformed { id, source })
            })
            .collect()
    }
}

/// Field names are restricted to identifiers so they can be spliced into a
/// JSON path.
fn ensure_field_safe(field: &str) -> MetadataResult<()> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MetadataError::InvalidField(field.to_string()))
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> MetadataResult<Document> {
        let id = Uuid::new_v4().simple().to_string();
        let created_at = Utc::now();
        let encoded = serde_json::to_string(&fields)?;

        sqlx::query(
            "INSERT INTO documents (id, collection, fields, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(collection.as_str())
        .bind(&encoded)
        .bind(created_at)
        .execute(&*self.db)
        .await?;

        debug!(%collection, %id, "inserted document");
        Ok(Document {
            id,
            collection,
            fields,
            created_at,
        })
    }

    async fn query_equal(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> MetadataResult<Vec<Document>> {
        ensure_field_safe(field)?;
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields, created_at FROM documents
             WHERE collection = ? AND json_extract(fields, ?) = ?
             ORDER BY rowid ASC",
        )
        .bind(collection.as_str())
        .bind(format!("$.{}", field))
        .bind(value)
        .fetch_all(&*self.db)
        .await?;

        debug!(%collection, field, value, matched = rows.len(), "equality query");
        Self::decode_rows(collection, rows)
    }

    async fn list_all(&self, collection: Collection) -> MetadataResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields, created_at FROM documents
             WHERE collection = ?
             ORDER BY rowid ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&*self.db)
        .await?;

        Self::decode_rows(collection, rows)
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(MetadataError::Sqlx(sqlx::Error::Protocol(format!(
                "unexpected health check result: {}",
                one
            ))));
        }
        Ok(())
    }
}
