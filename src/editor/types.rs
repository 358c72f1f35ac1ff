use anyhow::{Context, Result, anyhow};
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::data::{data_url, sniff_mime};
use crate::settings::Settings;
use crate::translations::AnalyzedTextBox;

/// Occlusion padding for items that carry none of their own.
pub const DEFAULT_ITEM_PADDING: f32 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct EditorImage {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EditorImage {
    /// Builds an image from uploaded bytes with a fresh id. Fails for payloads
    /// that are not a decodable image.
    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let mime_type = sniff_mime(&bytes)
            .ok_or_else(|| anyhow!("'{}' is not a supported image", name))?;
        let (width, height) = image_dimensions(&bytes)
            .with_context(|| format!("failed to read dimensions of '{}'", name))?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            mime_type,
            bytes,
            width,
            height,
        })
    }

    pub fn data_url(&self) -> String {
        data_url(&self.mime_type, &self.bytes)
    }
}

pub(crate) fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .with_context(|| "failed to sniff image format")?;
    reader
        .into_dimensions()
        .with_context(|| "failed to decode image header")
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    pub id: String,
    pub bbox: BoundingBox,
    pub original: String,
    pub translated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    pub blur: f32,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f32>,
}

/// Styling given to items created from analysis results.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefaults {
    pub blur: f32,
    pub padding: f32,
    pub color: String,
}

impl ItemDefaults {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            blur: settings.item_blur,
            padding: settings.item_padding,
            color: settings.item_color.clone(),
        }
    }
}

impl Default for ItemDefaults {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TextItem {
    pub fn from_analyzed(analyzed: &AnalyzedTextBox, defaults: &ItemDefaults) -> Self {
        let font_size = analyzed
            .font_size
            .filter(|size| *size > 0.0)
            .unwrap_or_else(|| (analyzed.bbox.height / 2.0).round());
        let color = analyzed
            .color
            .clone()
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| defaults.color.clone());
        Self {
            id: analyzed.id.clone(),
            bbox: BoundingBox {
                x: analyzed.bbox.x,
                y: analyzed.bbox.y,
                width: analyzed.bbox.width,
                height: analyzed.bbox.height,
                angle: None,
            },
            original: analyzed.original.clone(),
            translated: analyzed.translated.clone(),
            font_size: Some(font_size),
            blur: defaults.blur,
            visible: true,
            color: Some(color),
            angle: None,
            padding: Some(defaults.padding),
        }
    }

    pub fn effective_angle(&self) -> f32 {
        self.angle.or(self.bbox.angle).unwrap_or(0.0)
    }

    pub fn effective_font_size(&self) -> f32 {
        self.font_size
            .filter(|size| *size > 0.0)
            .unwrap_or_else(|| (self.bbox.height / 2.0).round())
    }

    pub fn effective_padding(&self) -> f32 {
        self.padding.unwrap_or(DEFAULT_ITEM_PADDING).round().max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Rect;
    use crate::test_util::png_bytes;

    fn analyzed(font_size: Option<f32>, color: Option<&str>) -> AnalyzedTextBox {
        AnalyzedTextBox {
            id: "img1-0".to_string(),
            bbox: Rect::new(50.0, 50.0, 200.0, 30.0),
            original: "你好".to_string(),
            translated: "안녕".to_string(),
            font_size,
            color: color.map(|value| value.to_string()),
        }
    }

    #[test]
    fn items_take_analysis_styling_first() {
        let item = TextItem::from_analyzed(&analyzed(Some(24.0), Some("#000000")), &ItemDefaults::default());
        assert_eq!(item.font_size, Some(24.0));
        assert_eq!(item.color.as_deref(), Some("#000000"));
        assert_eq!(item.blur, 16.0);
        assert_eq!(item.padding, Some(8.0));
        assert!(item.visible);
    }

    #[test]
    fn items_fall_back_to_editor_defaults() {
        let item = TextItem::from_analyzed(&analyzed(None, None), &ItemDefaults::default());
        assert_eq!(item.font_size, Some(15.0));
        assert_eq!(item.color.as_deref(), Some("#111111"));

        let mut bare = item.clone();
        bare.padding = None;
        assert_eq!(bare.effective_padding(), DEFAULT_ITEM_PADDING);
        bare.padding = Some(-3.0);
        assert_eq!(bare.effective_padding(), 0.0);
    }

    #[test]
    fn uploads_get_ids_and_dimensions() {
        let image = EditorImage::from_upload("poster.png", png_bytes(12, 7)).unwrap();
        assert_eq!((image.width, image.height), (12, 7));
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.id.len(), 36);
        assert!(EditorImage::from_upload("notes.txt", b"hello".to_vec()).is_err());
    }
}
