//! src/services/blob_store.rs
//!
//! Blob Store capability and its bundled on-disk implementation. Payloads
//! are sharded beneath `base_path/{shard}/{shard}/{key}` with a JSON sidecar
//! (`{key}.meta.json`) recording content type, size and MD5 etag.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::Context;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;
const SIDECAR_SUFFIX: &str = ".meta.json";
const TMP_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("blob sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Opaque reference to a stored blob returned by [`BlobStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    pub key: String,
    pub size_bytes: u64,
    pub etag: String,
}

/// Lifetime requested for a read URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlExpiry {
    /// Permanent public link.
    Never,
    /// Link refused by the media route after this instant.
    At(DateTime<Utc>),
}

/// Stored description of a blob.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlobInfo {
    pub key: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub etag: String,
    pub created_at: DateTime<Utc>,
}

/// Binary object storage consumed by ingest, the media route and the sweep.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any previous blob with that key.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> BlobResult<BlobHandle>;

    /// URL that serves the blob's bytes.
    async fn read_url(&self, handle: &BlobHandle, expiry: UrlExpiry) -> BlobResult<String>;

    /// Stored description plus an open handle ready for streaming out.
    async fn open(&self, key: &str) -> BlobResult<(BlobInfo, File)>;

    /// Every stored blob, in no particular order.
    async fn list(&self) -> BlobResult<Vec<BlobInfo>>;

    /// Remove a blob. Missing blobs are not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Best-effort write/read/delete probe used by readiness.
    async fn health_check(&self) -> BlobResult<()>;
}

/// Blob store on the local filesystem, serving bytes through `/media/{key}`
/// under `public_base_url`.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            base_path: base_path.into(),
            public_base_url,
        }
    }

    /// Rejects empty, oversized, absolute, traversing or control-character
    /// keys, plus keys that would collide with sidecar or temp files.
    fn ensure_key_safe(key: &str) -> BlobResult<()> {
        let invalid = || Err(BlobError::InvalidKey(key.to_string()));
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return invalid();
        }
        if key.starts_with('/') || key.contains("..") || key.ends_with('/') {
            return invalid();
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return invalid();
        }
        if key.ends_with(SIDECAR_SUFFIX) || key.split('/').any(|seg| seg.starts_with(TMP_PREFIX))
        {
            return invalid();
        }
        Ok(())
    }

    /// Two-level shard identifiers: first two bytes of MD5(key) as hex.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    fn sidecar_path(blob_path: &Path) -> PathBuf {
        let mut raw = blob_path.as_os_str().to_os_string();
        raw.push(SIDECAR_SUFFIX);
        PathBuf::from(raw)
    }

    async fn read_sidecar(&self, key: &str) -> BlobResult<BlobInfo> {
        let path = Self::sidecar_path(&self.blob_path(key));
        let raw = fs::read(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => BlobError::NotFound(key.to_string()),
            _ => BlobError::Io(err),
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Write bytes to a temp file beside `path`, fsync, then rename into place.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "blob path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    /// Recursively remove empty directories up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> BlobResult<BlobHandle> {
        Self::ensure_key_safe(key)?;
        let path = self.blob_path(key);

        let mut digest = Context::new();
        digest.consume(&bytes);
        let etag = format!("{:x}", digest.compute());

        Self::write_atomic(&path, &bytes).await?;

        let info = BlobInfo {
            key: key.to_string(),
            content_type: content_type.map(str::to_string),
            size_bytes: bytes.len() as u64,
            etag: etag.clone(),
            created_at: Utc::now(),
        };
        let sidecar = serde_json::to_vec(&info)?;
        if let Err(err) = Self::write_atomic(&Self::sidecar_path(&path), &sidecar).await {
            let _ = fs::remove_file(&path).await;
            return Err(BlobError::Io(err));
        }

        debug!(key, size_bytes = info.size_bytes, "stored blob {}", path.display());
        Ok(BlobHandle {
            key: info.key,
            size_bytes: info.size_bytes,
            etag,
        })
    }

    async fn read_url(&self, handle: &BlobHandle, expiry: UrlExpiry) -> BlobResult<String> {
        Self::ensure_key_safe(&handle.key)?;
        let mut url = format!("{}/media/{}", self.public_base_url, encode_path(&handle.key));
        if let UrlExpiry::At(at) = expiry {
            url.push_str(&format!("?expires={}", at.timestamp()));
        }
        Ok(url)
    }

    async fn open(&self, key: &str) -> BlobResult<(BlobInfo, File)> {
        Self::ensure_key_safe(key)?;
        let info = self.read_sidecar(key).await?;
        let file = File::open(self.blob_path(key))
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => BlobError::NotFound(key.to_string()),
                _ => BlobError::Io(err),
            })?;
        Ok((info, file))
    }

    async fn list(&self) -> BlobResult<Vec<BlobInfo>> {
        let mut found = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(BlobError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_sidecar = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(SIDECAR_SUFFIX));
                if !is_sidecar {
                    continue;
                }
                match serde_json::from_slice::<BlobInfo>(&fs::read(&path).await?) {
                    Ok(info) => found.push(info),
                    Err(err) => debug!("skipping unreadable sidecar {}: {}", path.display(), err),
                }
            }
        }

        Ok(found)
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.blob_path(key);
        for target in [Self::sidecar_path(&path), path.clone()] {
            match fs::remove_file(&target).await {
                Ok(_) => debug!("removed {}", target.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(BlobError::Io(err)),
            }
        }
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    async fn health_check(&self) -> BlobResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz").await?;
        let read_back = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        if read_back? != b"readyz" {
            return Err(BlobError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }
}

/// Percent-encode everything outside the unreserved set, keeping `/`.
fn encode_path(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
