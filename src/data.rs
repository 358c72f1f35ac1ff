use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct DataAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

impl DataAttachment {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, name: Option<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            name,
        }
    }

    pub fn data_url(&self) -> String {
        data_url(&self.mime, &self.bytes)
    }
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

pub fn decode_base64(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    let payload = match trimmed.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    BASE64
        .decode(payload)
        .with_context(|| "failed to decode base64 image payload")
}

pub fn load_attachment(path: &Path, mime_hint: Option<&str>) -> Result<DataAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    load_attachment_from_bytes(bytes, mime_hint, name.as_deref())
}

pub fn load_attachment_from_bytes(
    bytes: Vec<u8>,
    mime_hint: Option<&str>,
    name: Option<&str>,
) -> Result<DataAttachment> {
    let mime = resolve_mime(mime_hint.unwrap_or("auto"), &bytes)?;
    Ok(DataAttachment {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    let mime = kind.mime_type();
    if mime.starts_with("image/") {
        Some(mime.to_string())
    } else {
        None
    }
}

fn resolve_mime(input: &str, bytes: &[u8]) -> Result<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(anyhow!("image mime is empty"));
    }
    let lower = raw.to_lowercase();
    match lower.as_str() {
        "auto" | "image" | "image/*" => {
            sniff_mime(bytes).ok_or_else(|| anyhow!("unable to detect an image type from data"))
        }
        "png" => Ok(PNG_MIME.to_string()),
        "jpg" | "jpeg" => Ok(JPEG_MIME.to_string()),
        "gif" => Ok("image/gif".to_string()),
        "webp" => Ok("image/webp".to_string()),
        "bmp" => Ok("image/bmp".to_string()),
        "tiff" | "tif" => Ok("image/tiff".to_string()),
        value if value.starts_with("image/") => Ok(value.to_string()),
        _ => Err(anyhow!("unsupported image mime '{}'", raw)),
    }
}

pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpeg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}
