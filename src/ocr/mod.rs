mod engine;
mod mask;
mod render;
mod vision;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::data::DataAttachment;

pub use engine::geom::{clamp_rect, pad_rect, polygon_to_rect, union_rect};
pub use engine::{MergeConfig, ScriptFilter, extract_regions, merge_regions};
pub use mask::{
    MAX_MASK_SIDE, MaskColors, MaskRequest, MaskShape, build_mask, mask_geometry, mask_svg,
};
pub use render::{encode_image, escape_xml, rasterize_svg, render_svg_bytes};
pub use vision::GoogleVision;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Quadrilateral in image pixels, clockwise from the top-left corner as reported
/// by the OCR provider.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon(pub [Point; 4]);

impl Polygon {
    /// Missing vertices become `{0,0}`; extra vertices are ignored.
    pub fn from_vertices(vertices: &[Point]) -> Self {
        let mut points = [Point::default(); 4];
        for (slot, vertex) in points.iter_mut().zip(vertices) {
            *slot = *vertex;
        }
        Self(points)
    }

    pub fn from_rect(rect: &Rect) -> Self {
        Self([
            Point::new(rect.x, rect.y),
            Point::new(rect.right(), rect.y),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.x, rect.bottom()),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
    pub text: String,
    pub polygon: Polygon,
}

impl RawDetection {
    pub fn new(text: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            text: text.into(),
            polygon,
        }
    }

    pub fn rect(&self) -> Rect {
        polygon_to_rect(&self.polygon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRegion {
    pub text: String,
    pub rect: Rect,
}

/// Detections for one image, plus the page size when the provider reports it.
#[derive(Debug, Clone, Default)]
pub struct OcrPage {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub detections: Vec<RawDetection>,
}

pub type OcrFuture<'a> = Pin<Box<dyn Future<Output = Result<OcrPage>> + Send + 'a>>;

pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect<'a>(&'a self, image: &'a DataAttachment) -> OcrFuture<'a>;
}
