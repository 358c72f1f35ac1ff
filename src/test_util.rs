use anyhow::anyhow;
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

use crate::data::DataAttachment;
use crate::ocr::{OcrFuture, OcrPage, OcrProvider, Polygon, RawDetection, Rect, encode_image};
use crate::providers::{Provider, ProviderFuture, ProviderResponse};

/// Provider double: replays a fixed reply (or error) and records user prompts.
#[derive(Debug, Clone)]
pub(crate) struct StubProvider {
    reply: Result<String, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubProvider {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log").clone()
    }
}

impl Provider for StubProvider {
    fn append_system_input(self, _input: String) -> Self {
        self
    }

    fn append_user_input(self, input: String) -> Self {
        self.prompts.lock().expect("prompt log").push(input);
        self
    }

    fn append_user_data(self, _data: DataAttachment) -> Self {
        self
    }

    fn call_json(self) -> ProviderFuture {
        Box::pin(async move {
            match self.reply {
                Ok(text) => Ok(ProviderResponse {
                    text,
                    model: Some("stub".to_string()),
                    usage: None,
                }),
                Err(message) => Err(anyhow!(message)),
            }
        })
    }
}

pub(crate) struct StubOcr {
    page: OcrPage,
}

impl StubOcr {
    pub(crate) fn new(page: OcrPage) -> Self {
        Self { page }
    }
}

impl OcrProvider for StubOcr {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect<'a>(&'a self, _image: &'a DataAttachment) -> OcrFuture<'a> {
        let page = self.page.clone();
        Box::pin(async move { Ok(page) })
    }
}

pub(crate) fn detection(text: &str, rect: Rect) -> RawDetection {
    RawDetection::new(text, Polygon::from_rect(&rect))
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([240, 240, 240, 255]));
    encode_image(image, "image/png").expect("encode png")
}
