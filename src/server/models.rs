use serde::{Deserialize, Serialize};

use crate::analyzer::ImageAnalysis;
use crate::ocr::Rect;

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub images: Vec<AnalyzeImage>,
    pub model: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeImage {
    pub id: String,
    pub mime_type: Option<String>,
    pub data_base64: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// `{status, message, data}` envelope shared by every analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeEnvelope {
    pub status: String,
    pub message: String,
    pub data: Option<AnalyzeData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeData {
    pub results: Vec<ImageAnalysis>,
}

impl AnalyzeEnvelope {
    pub fn success(results: Vec<ImageAnalysis>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: "analyzed".to_string(),
            data: Some(AnalyzeData { results }),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: STATUS_ERROR.to_string(),
            message: if message.trim().is_empty() {
                "analysis_failed".to_string()
            } else {
                message
            },
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MaskPayload {
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default)]
    pub(crate) boxes: Vec<Rect>,
    pub(crate) padding: Option<f32>,
    pub(crate) inverted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
