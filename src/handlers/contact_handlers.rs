//! HTTP handlers for the contact form.

use crate::{
    errors::AppError,
    models::contact::{ContactForm, ContactMessage},
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// `POST /contato`: JSON `name`, `email`, `message`, optional `phone`.
pub async fn submit_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactForm>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(form) = payload?;
    let id = state.contacts.submit(form).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "message received", "id": id })),
    ))
}

/// `GET /contato`: every stored contact message.
pub async fn list_contacts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    Ok(Json(state.query.contacts().await?))
}
