use anyhow::{Result, anyhow};
use tracing::debug;

use super::engine::geom::{clamp_rect, pad_rect, polygon_to_rect};
use super::render::{escape_xml, render_svg_bytes};
use super::{Polygon, Rect};

pub const MAX_MASK_SIDE: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskShape {
    Rect(Rect),
    Polygon(Polygon),
}

impl MaskShape {
    pub fn bounds(&self) -> Rect {
        match self {
            MaskShape::Rect(rect) => *rect,
            MaskShape::Polygon(polygon) => polygon_to_rect(polygon),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskColors {
    pub background: String,
    pub foreground: String,
}

impl MaskColors {
    /// Swaps background and foreground, for inpainters that expect black text
    /// areas on white.
    pub fn inverted(&self) -> Self {
        Self {
            background: self.foreground.clone(),
            foreground: self.background.clone(),
        }
    }
}

impl Default for MaskColors {
    fn default() -> Self {
        Self {
            background: "#000000".to_string(),
            foreground: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaskRequest {
    pub width: u32,
    pub height: u32,
    pub shapes: Vec<MaskShape>,
    pub padding: f32,
    pub colors: MaskColors,
}

impl MaskRequest {
    pub fn new(width: u32, height: u32, shapes: Vec<MaskShape>) -> Self {
        Self {
            width,
            height,
            shapes,
            padding: 0.0,
            colors: MaskColors::default(),
        }
    }

    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_colors(mut self, colors: MaskColors) -> Self {
        self.colors = colors;
        self
    }
}

/// Final placement of every foreground shape. With padding, shapes collapse to
/// their padded bounding rect clamped into the image; without it they are
/// drawn untouched.
pub fn mask_geometry(request: &MaskRequest) -> Vec<MaskShape> {
    if request.padding <= 0.0 {
        return request.shapes.clone();
    }
    let width = request.width as f32;
    let height = request.height as f32;
    request
        .shapes
        .iter()
        .map(|shape| {
            let padded = pad_rect(&shape.bounds(), request.padding);
            MaskShape::Rect(clamp_rect(&padded, width, height))
        })
        .collect()
}

pub fn mask_svg(request: &MaskRequest) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#,
        w = request.width,
        h = request.height
    ));
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{w}" height="{h}" fill="{fill}"/>"#,
        w = request.width,
        h = request.height,
        fill = escape_xml(&request.colors.background)
    ));
    let fill = escape_xml(&request.colors.foreground);
    for shape in mask_geometry(request) {
        match shape {
            MaskShape::Rect(rect) => svg.push_str(&format!(
                r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
                x = rect.x,
                y = rect.y,
                w = rect.width,
                h = rect.height,
                fill = fill
            )),
            MaskShape::Polygon(polygon) => {
                let points = polygon
                    .points()
                    .iter()
                    .map(|point| format!("{},{}", point.x, point.y))
                    .collect::<Vec<_>>()
                    .join(" ");
                svg.push_str(&format!(
                    r#"<polygon points="{points}" fill="{fill}"/>"#,
                    points = points,
                    fill = fill
                ));
            }
        }
    }
    svg.push_str("</svg>");
    svg
}

/// Renders the mask at exactly `width x height` and encodes it as `output_mime`.
pub fn build_mask(request: &MaskRequest, output_mime: &str) -> Result<Vec<u8>> {
    if request.width == 0 || request.height == 0 {
        return Err(anyhow!(
            "mask size must be non-zero (got {}x{})",
            request.width,
            request.height
        ));
    }
    if request.width > MAX_MASK_SIDE || request.height > MAX_MASK_SIDE {
        return Err(anyhow!(
            "mask size {}x{} exceeds {} px per side",
            request.width,
            request.height,
            MAX_MASK_SIDE
        ));
    }
    debug!(
        "mask: {}x{} with {} shapes (padding {})",
        request.width,
        request.height,
        request.shapes.len(),
        request.padding
    );
    let svg = mask_svg(request);
    render_svg_bytes(
        &svg,
        Some((request.width, request.height)),
        output_mime,
        None,
    )
}
