//! HTTP handlers for flyer and gallery uploads and their listings.
//! Multipart bodies are buffered (bounded by the router's body limit) and
//! handed to `IngestService`.

use crate::{
    errors::AppError,
    models::{document::Collection, upload::UploadRecord},
    services::ingest_service::{FilePart, UploadRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const FILE_FIELD: &str = "file";

/// Body of a successful `POST` upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub id: String,
    pub url: String,
}

/// Optional `?date=` filter on `GET /gallery-media`.
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub date: Option<String>,
}

/// `POST /upload-flyer`: multipart `file`, `name`, `day`, optional `title`.
pub async fn upload_flyer(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = read_form(multipart?).await?;
    let request = UploadRequest {
        collection: Collection::Flyers,
        category: form.text.remove("day"),
        display_name: form.text.remove("name"),
        title: form.text.remove("title"),
        file: form.file,
    };
    let receipt = state.ingest.ingest(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "flyer uploaded".into(),
            id: receipt.id,
            url: receipt.url,
        }),
    ))
}

/// `GET /flyers/{day}`: flyers whose day equals the path segment.
pub async fn list_flyers_by_day(
    State(state): State<AppState>,
    day: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<UploadRecord>>, AppError> {
    let Path(day) = day?;
    let records = state.query.uploads(Collection::Flyers, Some(&day)).await?;
    Ok(Json(records))
}

/// `GET /flyers`: every flyer.
pub async fn list_flyers(
    State(state): State<AppState>,
) -> Result<Json<Vec<UploadRecord>>, AppError> {
    let records = state.query.uploads(Collection::Flyers, None).await?;
    Ok(Json(records))
}

/// `POST /upload-gallery-media`: multipart `file`, `title`, `date`.
pub async fn upload_gallery_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = read_form(multipart?).await?;
    let title = form.text.remove("title");
    let request = UploadRequest {
        collection: Collection::Gallery,
        category: form.text.remove("date"),
        display_name: title.clone(),
        title,
        file: form.file,
    };
    let receipt = state.ingest.ingest(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "gallery media uploaded".into(),
            id: receipt.id,
            url: receipt.url,
        }),
    ))
}

/// `GET /gallery-media`: every gallery item, or those on `?date=`.
pub async fn list_gallery_media(
    State(state): State<AppState>,
    query: Result<Query<GalleryQuery>, QueryRejection>,
) -> Result<Json<Vec<UploadRecord>>, AppError> {
    let Query(q) = query?;
    let date = q.date.as_deref().filter(|d| !d.is_empty());
    let records = state.query.uploads(Collection::Gallery, date).await?;
    Ok(Json(records))
}

struct UploadForm {
    text: HashMap<String, String>,
    file: Option<FilePart>,
}

/// Collect text fields and the first `file` part. Later duplicates of a text
/// field are ignored.
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        text: HashMap::new(),
        file: None,
    };

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == FILE_FIELD {
            let content_type = field.content_type().map(str::to_string);
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            if form.file.is_none() {
                form.file = Some(FilePart {
                    bytes,
                    content_type,
                    filename,
                });
            }
        } else {
            let value = field.text().await?;
            form.text.entry(name).or_insert(value);
        }
    }

    Ok(form)
}
