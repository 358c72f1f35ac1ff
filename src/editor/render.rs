use anyhow::{Result, anyhow};
use tracing::debug;

use super::scene::{BaseImage, BlurOverlay, CanvasObject, TextObject};
use crate::data::data_url;
use crate::ocr::{escape_xml, render_svg_bytes};

const LINE_HEIGHT: f32 = 1.16;

/// Composites base, blur overlays and text into one SVG document sized to the
/// base image. Objects are painted in list order.
pub fn scene_svg(objects: &[CanvasObject]) -> Result<String> {
    let base = objects
        .iter()
        .find_map(|object| match object {
            CanvasObject::Base(base) => Some(base),
            _ => None,
        })
        .ok_or_else(|| anyhow!("scene has no base image"))?;
    let href = data_url(&base.mime_type, &base.bytes);

    let mut defs = String::new();
    let mut body = String::new();
    for (index, object) in objects.iter().enumerate() {
        match object {
            CanvasObject::Base(base) => body.push_str(&image_tag(base, &href, None)),
            CanvasObject::Overlay(overlay) => {
                defs.push_str(&overlay_defs(index, overlay, base));
                body.push_str(&image_tag(base, &href, Some(index)));
            }
            CanvasObject::Text(text) => body.push_str(&text_tag(text)),
        }
    }

    Ok(format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><defs>{defs}</defs>{body}</svg>"#,
        w = base.width,
        h = base.height,
        defs = defs,
        body = body
    ))
}

/// Renders the scene at the base image's size.
pub fn render_scene(objects: &[CanvasObject], output_mime: &str) -> Result<Vec<u8>> {
    let svg = scene_svg(objects)?;
    let size = objects.iter().find_map(|object| match object {
        CanvasObject::Base(base) => Some((base.width, base.height)),
        _ => None,
    });
    debug!("export: {} objects as {}", objects.len(), output_mime);
    render_svg_bytes(&svg, size, output_mime, None)
}

fn overlay_defs(index: usize, overlay: &BlurOverlay, base: &BaseImage) -> String {
    let clip = &overlay.clip;
    format!(
        r#"<filter id="blur-{i}" filterUnits="userSpaceOnUse" x="0" y="0" width="{w}" height="{h}"><feGaussianBlur stdDeviation="{dev}"/></filter><clipPath id="clip-{i}" clipPathUnits="userSpaceOnUse"><rect x="{x}" y="{y}" width="{cw}" height="{ch}" transform="rotate({a} {ox} {oy})"/></clipPath>"#,
        i = index,
        w = base.width,
        h = base.height,
        dev = (overlay.blur * overlay.strength / 2.0).max(0.0),
        x = clip.x,
        y = clip.y,
        cw = clip.width.max(0.0),
        ch = clip.height.max(0.0),
        a = clip.angle,
        ox = clip.origin_x,
        oy = clip.origin_y
    )
}

fn image_tag(base: &BaseImage, href: &str, overlay: Option<usize>) -> String {
    let effects = overlay
        .map(|i| format!(r#" clip-path="url(#clip-{i})" filter="url(#blur-{i})""#, i = i))
        .unwrap_or_default();
    // Filter and clip on one element: the blur is computed first, then clipped.
    format!(
        r#"<image x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none" xlink:href="{href}"{effects}/>"#,
        w = base.width,
        h = base.height,
        href = href,
        effects = effects
    )
}

fn text_tag(text: &TextObject) -> String {
    let center = text.left + text.scaled_width() / 2.0;
    let line_height = text.font_size * LINE_HEIGHT;
    let lines = text
        .text
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            format!(
                r#"<tspan x="{x}" y="{y}">{line}</tspan>"#,
                x = center,
                y = text.top + text.font_size + line_height * index as f32,
                line = escape_xml(line)
            )
        })
        .collect::<String>();
    format!(
        r#"<g transform="rotate({a} {l} {t})"><text font-size="{size}" fill="{fill}" text-anchor="middle" font-family="sans-serif">{lines}</text></g>"#,
        a = text.angle,
        l = text.left,
        t = text.top,
        size = text.font_size,
        fill = escape_xml(&text.fill),
        lines = lines
    )
}
