//! Serves stored blobs back under the URLs handed out at ingest.

use crate::{errors::AppError, services::blob_store::BlobInfo, state::AppState};
use axum::{
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    /// Unix seconds after which the link is refused.
    pub expires: Option<i64>,
}

/// `GET /media/{*key}`: stream a blob with its stored content type.
pub async fn get_media(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    query: Result<Query<MediaQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Path(key) = key?;
    let Query(q) = query?;
    if let Some(expires) = q.expires {
        if Utc::now().timestamp() > expires {
            return Err(AppError::new(StatusCode::GONE, "media link has expired"));
        }
    }

    let (info, file) = state.blobs.open(&key).await?;
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    set_media_headers(response.headers_mut(), &info);
    Ok(response)
}

fn set_media_headers(headers: &mut HeaderMap, info: &BlobInfo) {
    let content_type = info
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(info.size_bytes));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", info.etag)) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&info.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
