//! Represents a stored record: a generated id, a creation timestamp and a
//! free-form JSON field map, grouped by collection.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::fmt;

/// Named record namespace inside the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Flyers,
    Gallery,
    Contacts,
}

impl Collection {
    /// Collections whose records point at a blob.
    pub const UPLOADS: [Collection; 2] = [Collection::Flyers, Collection::Gallery];

    pub const fn as_str(self) -> &'static str {
        match self {
            Collection::Flyers => "flyers",
            Collection::Gallery => "gallery",
            Collection::Contacts => "contacts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as returned by the metadata store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Store-generated identifier.
    pub id: String,

    /// Collection the record belongs to.
    pub collection: Collection,

    /// Caller-supplied fields.
    pub fields: Map<String, Value>,

    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Decode the field map into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }

    /// String value of a top-level field, if present.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Encode a typed value into the field map stored alongside a document.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            Ok(map)
        }
    }
}

/// Raw row shape of the `documents` table.
#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub fields: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn into_document(self, collection: Collection) -> Result<Document, serde_json::Error> {
        let fields = match serde_json::from_str::<Value>(&self.fields)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Document {
            id: self.id,
            collection,
            fields,
            created_at: self.created_at,
        })
    }
}
