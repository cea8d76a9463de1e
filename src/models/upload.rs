//! Represents an indexed upload (flyer or gallery media).

use super::document::{Collection, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name the category filter matches on.
pub const CATEGORY_FIELD: &str = "category";

/// Field name holding the storage key of the uploaded blob.
pub const BLOB_KEY_FIELD: &str = "blobKey";

/// Fields persisted for an upload record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadFields {
    /// Filter key: the flyer's day or the gallery item's date.
    pub category: String,

    /// Human readable name shown with the media.
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Long-lived read URL handed out by the blob store.
    pub media_url: String,

    pub is_video: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Storage key of the blob backing `media_url`.
    pub blob_key: String,
}

/// An upload as returned to clients.
///
/// `display_name` and `media_url` keep the `name` / `url` keys the site
/// front-end reads. The category is repeated under the form field it came
/// from: `day` for flyers, `date` for gallery media.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "url")]
    pub media_url: String,
    pub is_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip)]
    pub blob_key: String,
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let fields: UploadFields = doc.decode()?;
        let (day, date) = match doc.collection {
            Collection::Flyers => (Some(fields.category.clone()), None),
            Collection::Gallery => (None, Some(fields.category.clone())),
            Collection::Contacts => (None, None),
        };
        Ok(Self {
            id: doc.id.clone(),
            category: fields.category,
            day,
            date,
            display_name: fields.display_name,
            title: fields.title,
            media_url: fields.media_url,
            is_video: fields.is_video,
            content_type: fields.content_type,
            blob_key: fields.blob_key,
            created_at: doc.created_at,
        })
    }
}

/// True iff the declared content type names a video.
pub fn is_video(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("video"))
}
