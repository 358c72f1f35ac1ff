use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{OcrFuture, OcrPage, OcrProvider, Point, Polygon, RawDetection};
use crate::data::DataAttachment;
use crate::providers::retry::{format_error_parts, send_with_retry};

const DEFAULT_BASE_URL: &str = "https://vision.googleapis.com/v1";

/// Google Cloud Vision `TEXT_DETECTION` over REST.
#[derive(Debug, Clone)]
pub struct GoogleVision {
    key: String,
    base_url: String,
}

impl GoogleVision {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            base_url: std::env::var("GOOGLE_VISION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }

    pub fn from_env() -> Result<Self> {
        get_env("GOOGLE_VISION_API_KEY")
            .or_else(|| get_env("GOOGLE_API_KEY"))
            .map(Self::new)
            .ok_or_else(|| {
                anyhow!("Vision API key not found (checked GOOGLE_VISION_API_KEY, GOOGLE_API_KEY)")
            })
    }
}

impl OcrProvider for GoogleVision {
    fn name(&self) -> &'static str {
        "google-vision"
    }

    fn detect<'a>(&'a self, image: &'a DataAttachment) -> OcrFuture<'a> {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/images:annotate", self.base_url);
            let body = json!({
                "requests": [
                    {
                        "image": {"content": BASE64.encode(&image.bytes)},
                        "features": [{"type": "TEXT_DETECTION"}]
                    }
                ]
            });
            let text = send_with_retry(
                "Vision",
                || {
                    client
                        .post(&url)
                        .query(&[("key", self.key.as_str())])
                        .json(&body)
                },
                extract_vision_error,
            )
            .await?;
            parse_annotate_response(&text)
        })
    }
}

pub(crate) fn parse_annotate_response(text: &str) -> Result<OcrPage> {
    let payload: AnnotateResponse =
        serde_json::from_str(text).with_context(|| "failed to parse Vision response JSON")?;
    let Some(response) = payload.responses.into_iter().next() else {
        return Ok(OcrPage::default());
    };
    if let Some(error) = response.error {
        return Err(anyhow!(
            "Vision API error: {}",
            format_error_parts(error.message, None, error.code.map(|code| code.to_string()))
        ));
    }

    let page = response
        .full_text_annotation
        .and_then(|annotation| annotation.pages.into_iter().next());
    // The first annotation is the whole-page text block.
    let detections = response
        .text_annotations
        .into_iter()
        .skip(1)
        .map(|annotation| {
            let vertices = annotation
                .bounding_poly
                .map(|poly| poly.vertices)
                .unwrap_or_default()
                .into_iter()
                .map(|vertex| Point::new(vertex.x.unwrap_or(0.0), vertex.y.unwrap_or(0.0)))
                .collect::<Vec<_>>();
            RawDetection::new(
                annotation.description.unwrap_or_default(),
                Polygon::from_vertices(&vertices),
            )
        })
        .collect::<Vec<_>>();
    debug!("vision: {} text annotations", detections.len());

    Ok(OcrPage {
        width: page.as_ref().and_then(|page| page.width),
        height: page.as_ref().and_then(|page| page.height),
        detections,
    })
}

fn extract_vision_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<VisionError>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|code| code.to_string()),
    ))
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<VisionError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextAnnotation {
    description: Option<String>,
    bounding_poly: Option<BoundingPoly>,
}

#[derive(Debug, Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<Vertex>,
}

#[derive(Debug, Deserialize)]
struct Vertex {
    x: Option<f32>,
    y: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    pages: Vec<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VisionError {
    message: Option<String>,
    status: Option<String>,
    code: Option<i32>,
}
