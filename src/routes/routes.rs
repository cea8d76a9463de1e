//! Defines routes for uploads, listings, contact messages and media.
//!
//! ## Structure
//! - **Flyers**
//!   - `POST /upload-flyer`: multipart `file`, `name`, `day`, (`title`)
//!   - `GET  /flyers/{day}`: flyers for one day
//!   - `GET  /flyers`: every flyer
//! - **Gallery**
//!   - `POST /upload-gallery-media`: multipart `file`, `title`, `date`
//!   - `GET  /gallery-media`: every item, optional `?date=`
//! - **Contact**
//!   - `POST /contato`: JSON `name`, `email`, `message`, (`phone`)
//!   - `GET  /contato`: every message
//! - **Media**
//!   - `GET  /media/{*key}`: blob bytes behind a record's `url`

use crate::{
    handlers::{
        contact_handlers::{list_contacts, submit_contact},
        health_handlers::{healthz, readyz},
        media_handlers::get_media,
        upload_handlers::{
            list_flyers, list_flyers_by_day, list_gallery_media, upload_flyer,
            upload_gallery_media,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the small text fields beside the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build and return the router for every endpoint.
///
/// Upload routes accept bodies up to `max_upload_bytes` plus multipart
/// framing; the exact file ceiling is enforced again by ingest.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // uploads
        .route(
            "/upload-flyer",
            post(upload_flyer).layer(upload_limit.clone()),
        )
        .route(
            "/upload-gallery-media",
            post(upload_gallery_media).layer(upload_limit),
        )
        // listings
        .route("/flyers", get(list_flyers))
        .route("/flyers/{day}", get(list_flyers_by_day))
        .route("/gallery-media", get(list_gallery_media))
        .route("/contato", get(list_contacts).post(submit_contact))
        // media
        .route("/media/{*key}", get(get_media))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::blob_store::LocalBlobStore,
        test_support::{CountingBlobStore, CountingMetadataStore, memory_metadata_store},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::{Arc, atomic::Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "flyerboardtestboundary";

    struct Harness {
        _dir: tempfile::TempDir,
        app: Router,
        blobs: Arc<CountingBlobStore>,
        metadata: Arc<CountingMetadataStore>,
    }

    async fn harness(max_upload_bytes: usize) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(CountingBlobStore::new(Arc::new(LocalBlobStore::new(
            dir.path(),
            "http://localhost:5000",
        ))));
        let metadata = Arc::new(CountingMetadataStore::new(Arc::new(
            memory_metadata_store().await,
        )));
        let state = AppState::new(blobs.clone(), metadata.clone(), max_upload_bytes);
        Harness {
            _dir: dir,
            app: routes(max_upload_bytes).with_state(state),
            blobs,
            metadata,
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File {
            filename: &'a str,
            content_type: &'a str,
            bytes: &'a [u8],
        },
    }

    fn multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File {
                    filename,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn png_1kb() -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.resize(1024, 0xAB);
        bytes
    }

    fn path_of(url: &str) -> &str {
        url.strip_prefix("http://localhost:5000").unwrap()
    }

    #[tokio::test]
    async fn flyer_upload_then_query_by_day() {
        let h = harness(1024 * 1024).await;
        let png = png_1kb();

        let (status, body) = send_json(
            &h.app,
            multipart(
                "/upload-flyer",
                &[
                    Part::Text("name", "Friday Jam"),
                    Part::Text("day", "2024-06-07"),
                    Part::File {
                        filename: "flyer.png",
                        content_type: "image/png",
                        bytes: &png,
                    },
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();
        let url = body["url"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(url.starts_with("http://"));

        let (status, list) = send_json(&h.app, get("/flyers/2024-06-07")).await;
        assert_eq!(status, StatusCode::OK);
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], id.as_str());
        assert_eq!(list[0]["name"], "Friday Jam");
        assert_eq!(list[0]["url"], url.as_str());
        assert_eq!(list[0]["isVideo"], false);
        assert_eq!(list[0]["day"], "2024-06-07");

        let (status, bytes) = send(&h.app, get(path_of(&url))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected_before_any_store_call() {
        let h = harness(1024 * 1024).await;
        let (status, body) = send_json(
            &h.app,
            multipart(
                "/upload-flyer",
                &[Part::Text("name", "Friday Jam"), Part::Text("day", "2024-06-07")],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "no file supplied");
        assert_eq!(h.blobs.calls(), 0);
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_any_store_call() {
        let h = harness(512).await;
        let png = png_1kb();
        let (status, _) = send(
            &h.app,
            multipart(
                "/upload-flyer",
                &[
                    Part::Text("name", "Big"),
                    Part::Text("day", "2024-06-07"),
                    Part::File {
                        filename: "big.png",
                        content_type: "image/png",
                        bytes: &png,
                    },
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.blobs.calls(), 0);
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn body_beyond_router_limit_is_rejected() {
        let h = harness(16).await;
        let big = vec![1u8; MULTIPART_OVERHEAD_BYTES + 1024];
        let (status, _) = send(
            &h.app,
            multipart(
                "/upload-gallery-media",
                &[
                    Part::Text("title", "Huge"),
                    Part::Text("date", "2024-06-07"),
                    Part::File {
                        filename: "huge.mp4",
                        content_type: "video/mp4",
                        bytes: &big,
                    },
                ],
            ),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn gallery_upload_and_listing() {
        let h = harness(1024 * 1024).await;
        for (title, date, ct) in [
            ("Opening", "2024-05-01", "video/mp4"),
            ("Crowd", "2024-05-02", "image/jpeg"),
        ] {
            let (status, _) = send(
                &h.app,
                multipart(
                    "/upload-gallery-media",
                    &[
                        Part::Text("title", title),
                        Part::Text("date", date),
                        Part::File {
                            filename: "media",
                            content_type: ct,
                            bytes: b"payload",
                        },
                    ],
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = send_json(&h.app, get("/gallery-media")).await;
        let all = all.as_array().unwrap();
        assert_eq!(all.len(), 2);
        let opening = all.iter().find(|r| r["name"] == "Opening").unwrap();
        assert_eq!(opening["isVideo"], true);
        assert_eq!(opening["title"], "Opening");

        let (_, filtered) = send_json(&h.app, get("/gallery-media?date=2024-05-02")).await;
        assert_eq!(filtered.as_array().unwrap().len(), 1);
        assert_eq!(filtered[0]["date"], "2024-05-02");
    }

    #[tokio::test]
    async fn unmatched_day_returns_empty_list() {
        let h = harness(1024).await;
        let (status, body) = send_json(&h.app, get("/flyers/1999-01-01")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(vec![]));
    }

    #[tokio::test]
    async fn metadata_outage_is_500_with_message() {
        let h = harness(1024).await;
        h.metadata.fail_reads.store(true, Ordering::SeqCst);
        let (status, body) = send_json(&h.app, get("/flyers")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn blob_outage_on_upload_is_500_and_writes_no_record() {
        let h = harness(1024).await;
        h.blobs.fail_puts.store(true, Ordering::SeqCst);
        let (status, _) = send(
            &h.app,
            multipart(
                "/upload-flyer",
                &[
                    Part::Text("name", "a"),
                    Part::Text("day", "b"),
                    Part::File {
                        filename: "a.png",
                        content_type: "image/png",
                        bytes: b"x",
                    },
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn contact_missing_email_is_400_without_store_call() {
        let h = harness(1024).await;
        let (status, body) = send_json(
            &h.app,
            post_json(
                "/contato",
                serde_json::json!({"name": "Ana", "message": "Hi", "phone": "555"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("email"));
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_contact_json_is_400() {
        let h = harness(1024).await;
        let req = Request::post("/contato")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn contact_submit_and_list() {
        let h = harness(1024).await;
        let (status, body) = send_json(
            &h.app,
            post_json(
                "/contato",
                serde_json::json!({
                    "name": "Ana",
                    "email": "ana@example.com",
                    "message": "Hi",
                    "phone": "555"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, list) = send_json(&h.app, get("/contato")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["id"], id.as_str());
        assert_eq!(list[0]["email"], "ana@example.com");
        assert!(list[0]["createdAt"].is_string());
    }

    #[tokio::test]
    async fn unknown_and_expired_media() {
        let h = harness(1024).await;
        let (status, _) = send(&h.app, get("/media/flyers/none.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&h.app, get("/media/flyers/none.png?expires=1")).await;
        assert_eq!(status, StatusCode::GONE);
    }

    #[tokio::test]
    async fn non_multipart_upload_gets_json_error_body() {
        let h = harness(1024).await;
        let (status, body) = send_json(&h.app, post_json("/upload-flyer", serde_json::json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
        assert_eq!(body["status"], 400);
        assert_eq!(h.blobs.calls(), 0);
        assert_eq!(h.metadata.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_query_strings_get_json_error_body() {
        let h = harness(1024).await;
        for uri in ["/media/flyers/x.png?expires=abc", "/gallery-media?date=a&date=b"] {
            let (status, body) = send_json(&h.app, get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["message"].is_string(), "{uri}");
        }
        assert_eq!(h.blobs.calls(), 0);
    }

    #[tokio::test]
    async fn health_endpoints() {
        let h = harness(1024).await;
        let (status, body) = send_json(&h.app, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send_json(&h.app, get("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["metadata"]["ok"], true);
        assert_eq!(body["checks"]["blobs"]["ok"], true);
    }
}
