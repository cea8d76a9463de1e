//! Represents a contact-form submission.

use super::document::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw JSON body of `POST /contato`. Every field is optional here so that
/// missing fields surface as validation errors instead of body rejections.
#[derive(Deserialize, Debug, Default)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub phone: Option<String>,
}

/// Fields persisted for a contact message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContactFields {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A stored contact message as returned to clients.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let fields: ContactFields = doc.decode()?;
        Ok(Self {
            id: doc.id.clone(),
            name: fields.name,
            email: fields.email,
            message: fields.message,
            phone: fields.phone,
            created_at: doc.created_at,
        })
    }
}
