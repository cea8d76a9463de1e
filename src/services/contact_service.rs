//! Contact-form submissions: validate, then index. No blob involved.

use super::{ServiceError, ServiceResult, metadata_store::MetadataStore};
use crate::models::{
    contact::{ContactFields, ContactForm},
    document::{Collection, to_fields},
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ContactService {
    metadata: Arc<dyn MetadataStore>,
}

impl ContactService {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Store a contact message and return its generated id.
    pub async fn submit(&self, form: ContactForm) -> ServiceResult<String> {
        let fields = validate(form)?;
        let fields = to_fields(&fields).map_err(|err| ServiceError::MetadataWrite(err.into()))?;
        let doc = self
            .metadata
            .insert(Collection::Contacts, fields)
            .await
            .map_err(ServiceError::MetadataWrite)?;
        info!(id = %doc.id, "contact message stored");
        Ok(doc.id)
    }
}

/// `name`, `email` and `message` are required and must not be blank.
pub fn validate(form: ContactForm) -> ServiceResult<ContactFields> {
    let take = |value: Option<String>, label: &str| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::validation(format!("missing field `{}`", label)))
    };

    Ok(ContactFields {
        name: take(form.name, "name")?,
        email: take(form.email, "email")?,
        message: take(form.message, "message")?,
        phone: form
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
    })
}
