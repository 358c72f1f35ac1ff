use super::types::{EditorImage, TextItem};

pub const DEFAULT_TEXT_FILL: &str = "#FFF";

#[derive(Debug, Clone, PartialEq)]
pub struct BaseImage {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl BaseImage {
    pub fn from_image(image: &EditorImage) -> Self {
        Self {
            image_id: image.id.clone(),
            width: image.width,
            height: image.height,
            mime_type: image.mime_type.clone(),
            bytes: image.bytes.clone(),
        }
    }
}

/// Rectangle rotated by `angle` degrees around its unpadded top-left corner
/// (`origin_x`, `origin_y`), matching the text object's rotation origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlurOverlay {
    pub item_id: String,
    pub clip: ClipRect,
    pub padding: f32,
    pub blur: f32,
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub item_id: String,
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub fill: String,
    pub angle: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub editing: bool,
}

impl TextObject {
    pub fn scaled_width(&self) -> f32 {
        self.width * self.scale_x
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasObject {
    Base(BaseImage),
    Overlay(BlurOverlay),
    Text(TextObject),
}

impl CanvasObject {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            CanvasObject::Base(_) => None,
            CanvasObject::Overlay(overlay) => Some(&overlay.item_id),
            CanvasObject::Text(text) => Some(&text.item_id),
        }
    }
}

pub fn blur_strength(blur: f32) -> f32 {
    (blur / 30.0).clamp(0.01, 1.0)
}

pub fn overlay_clip(x: f32, y: f32, width: f32, height: f32, padding: f32, angle: f32) -> ClipRect {
    ClipRect {
        x: x - padding,
        y: y - padding,
        width: width + padding * 2.0,
        height: height + padding * 2.0,
        angle,
        origin_x: x,
        origin_y: y,
    }
}

pub fn blur_overlay(item: &TextItem) -> BlurOverlay {
    let padding = item.effective_padding();
    BlurOverlay {
        item_id: item.id.clone(),
        clip: overlay_clip(
            item.bbox.x,
            item.bbox.y,
            item.bbox.width,
            item.bbox.height,
            padding,
            item.effective_angle(),
        ),
        padding,
        blur: item.blur,
        strength: blur_strength(item.blur),
    }
}

pub fn text_object(item: &TextItem) -> TextObject {
    TextObject {
        item_id: item.id.clone(),
        text: item.translated.clone(),
        left: item.bbox.x,
        top: item.bbox.y,
        width: item.bbox.width,
        height: item.bbox.height,
        font_size: item.effective_font_size(),
        fill: item
            .color
            .clone()
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEXT_FILL.to_string()),
        angle: item.effective_angle(),
        scale_x: 1.0,
        scale_y: 1.0,
        editing: false,
    }
}

/// Base first, then one blur overlay per visible item, then every text object,
/// so no overlay ever covers text.
pub fn build_scene(base: &BaseImage, items: &[TextItem]) -> Vec<CanvasObject> {
    let visible = items.iter().filter(|item| item.visible).collect::<Vec<_>>();
    let mut objects = Vec::with_capacity(1 + visible.len() * 2);
    objects.push(CanvasObject::Base(base.clone()));
    objects.extend(
        visible
            .iter()
            .map(|item| CanvasObject::Overlay(blur_overlay(item))),
    );
    objects.extend(
        visible
            .iter()
            .map(|item| CanvasObject::Text(text_object(item))),
    );
    objects
}
