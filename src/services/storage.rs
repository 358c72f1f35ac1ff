use anyhow::{Context, Result, anyhow};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

use crate::data::extension_from_mime;
use crate::providers::retry::send_with_retry;

pub type StorageFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Stages bytes somewhere the inpainting service can fetch them and returns
/// the public URL.
pub trait ObjectStorage: Send + Sync {
    fn put<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
        key_parts: &'a [String],
    ) -> StorageFuture<'a>;
}

/// `key_parts.join("/") + "." + ext`, with the extension taken from the content type.
pub fn object_key(key_parts: &[String], content_type: &str) -> Result<String> {
    if key_parts.is_empty() {
        return Err(anyhow!("object key needs at least one part"));
    }
    let ext = extension_from_mime(content_type)
        .ok_or_else(|| anyhow!("no file extension for content type '{}'", content_type))?;
    let parts = key_parts
        .iter()
        .map(|part| part.trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    Ok(format!("{}.{}", parts.join("/"), ext))
}

/// `resources/{scope}/{YYYY-MM}/{DD}/{md5 of bytes}`.
pub fn dated_key_parts(scope: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let now = OffsetDateTime::now_utc();
    Ok(vec![
        "resources".to_string(),
        scope.to_string(),
        now.format(format_description!("[year]-[month]"))
            .with_context(|| "failed to format date")?,
        now.format(format_description!("[day]"))
            .with_context(|| "failed to format date")?,
        format!("{:x}", md5::compute(bytes)),
    ])
}

/// PUTs objects to `{endpoint}/{key}` and hands out `{public_host}/{key}`.
#[derive(Debug, Clone)]
pub struct HttpStorage {
    endpoint: String,
    public_host: String,
    client: reqwest::Client,
}

impl HttpStorage {
    pub fn new(endpoint: impl Into<String>, public_host: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            public_host: public_host.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl ObjectStorage for HttpStorage {
    fn put<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
        key_parts: &'a [String],
    ) -> StorageFuture<'a> {
        Box::pin(async move {
            let key = object_key(key_parts, content_type)?;
            let url = format!("{}/{}", self.endpoint, key);
            send_with_retry(
                "Storage",
                || {
                    self.client
                        .put(&url)
                        .header(reqwest::header::CONTENT_TYPE, content_type)
                        .body(bytes.to_vec())
                },
                |_| None,
            )
            .await?;
            debug!("storage: uploaded {} ({} bytes)", key, bytes.len());
            Ok(format!("{}/{}", self.public_host, key))
        })
    }
}

/// Writes objects under a local directory; URLs are `file://` paths.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStorage for LocalStorage {
    fn put<'a>(
        &'a self,
        bytes: &'a [u8],
        content_type: &'a str,
        key_parts: &'a [String],
    ) -> StorageFuture<'a> {
        Box::pin(async move {
            let key = object_key(key_parts, content_type)?;
            let path = self.root.join(&key);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::write(&path, bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            let absolute = std::path::absolute(&path).unwrap_or(path);
            Ok(format!("file://{}", absolute.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parts(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn key_joins_parts_and_appends_extension() {
        let key = object_key(&parts(&["resources", "mask/", "abc"]), "image/png").unwrap();
        assert_eq!(key, "resources/mask/abc.png");
        let key = object_key(&parts(&["photo"]), "image/jpeg").unwrap();
        assert_eq!(key, "photo.jpeg");
        assert!(object_key(&parts(&["a"]), "text/plain").is_err());
        assert!(object_key(&[], "image/png").is_err());
    }

    #[test]
    fn dated_parts_are_content_addressed() {
        let first = dated_key_parts("source", b"same").unwrap();
        let second = dated_key_parts("source", b"same").unwrap();
        assert_eq!(first[0], "resources");
        assert_eq!(first[1], "source");
        assert_eq!(first[2].len(), 7);
        assert_eq!(first[3].len(), 2);
        assert_eq!(first[4], second[4]);
        assert_eq!(first[4].len(), 32);
    }

    #[tokio::test]
    async fn local_storage_writes_under_root() {
        let dir = tempdir().expect("tempdir");
        let storage = LocalStorage::new(dir.path());
        let url = storage
            .put(b"png-bytes", "image/png", &parts(&["masks", "img1"]))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("masks/img1.png"));
        let written = std::fs::read(dir.path().join("masks/img1.png")).unwrap();
        assert_eq!(written, b"png-bytes");
    }
}
