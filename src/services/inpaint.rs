use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::pin::Pin;

use crate::providers::retry::{format_error_parts, send_with_retry};

pub type InpaintFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Removes masked text from an image. Both inputs are URLs because the service
/// cannot take inline bytes.
pub trait Inpainter: Send + Sync {
    fn inpaint<'a>(&'a self, image_url: &'a str, mask_url: &'a str) -> InpaintFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct HttpInpainter {
    endpoint: String,
    key: Option<String>,
    client: reqwest::Client,
}

impl HttpInpainter {
    pub fn new(endpoint: impl Into<String>, key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env(endpoint: impl Into<String>) -> Self {
        let key = std::env::var("INPAINT_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(endpoint, key)
    }
}

impl Inpainter for HttpInpainter {
    fn inpaint<'a>(&'a self, image_url: &'a str, mask_url: &'a str) -> InpaintFuture<'a> {
        Box::pin(async move {
            let body = json!({"imageUrl": image_url, "maskUrl": mask_url});
            let text = send_with_retry(
                "Inpaint",
                || {
                    let request = self.client.post(&self.endpoint).json(&body);
                    match &self.key {
                        Some(key) => request.bearer_auth(key),
                        None => request,
                    }
                },
                extract_inpaint_error,
            )
            .await?;
            parse_inpaint_response(&text)
        })
    }
}

/// Accepts `{url}` or `{output}`, where `output` may be a string or a list of
/// URLs (first one wins).
pub(crate) fn parse_inpaint_response(text: &str) -> Result<String> {
    let value: Value =
        serde_json::from_str(text).with_context(|| "failed to parse inpaint response JSON")?;
    let url = value
        .get("url")
        .and_then(Value::as_str)
        .or_else(|| match value.get("output") {
            Some(Value::String(url)) => Some(url.as_str()),
            Some(Value::Array(items)) => items.first().and_then(Value::as_str),
            _ => None,
        })
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| anyhow!("inpaint response has no image url"))?;
    Ok(url.to_string())
}

fn extract_inpaint_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<Value>,
        detail: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.error {
        Some(Value::String(message)) => Some(message),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map(|message| message.to_string()),
        _ => None,
    };
    Some(format_error_parts(message.or(parsed.detail), None, None))
}
