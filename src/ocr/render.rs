use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::{Pixmap, Transform};
use usvg::{Options, Tree, fontdb};

/// Rasterizes `svg`. With a `target`, the drawing is stretched to exactly that
/// many pixels regardless of the SVG's own size.
pub fn rasterize_svg(
    svg: &str,
    target: Option<(u32, u32)>,
    font_data: Option<&[u8]>,
) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    if font_data.is_some() || svg.contains("<text") {
        db.load_system_fonts();
    }
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let natural = tree.size().to_int_size();
    let (width, height) = target.unwrap_or((natural.width(), natural.height()));
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| anyhow!("empty SVG size"))?;
    let transform = Transform::from_scale(
        width as f32 / tree.size().width(),
        height as f32 / tree.size().height(),
    );
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, transform, &mut pixmap_mut);

    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn encode_image(image: RgbaImage, output_mime: &str) -> Result<Vec<u8>> {
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let image = match format {
        // JPEG has no alpha channel.
        image::ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image).to_rgb8()),
        _ => DynamicImage::ImageRgba8(image),
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image
        .write_to(&mut cursor, format)
        .with_context(|| format!("failed to encode {}", output_mime))?;
    Ok(bytes)
}

pub fn render_svg_bytes(
    svg: &str,
    target: Option<(u32, u32)>,
    output_mime: &str,
    font_data: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let image = rasterize_svg(svg, target, font_data)?;
    encode_image(image, output_mime)
}

fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" => Some(image::ImageFormat::Jpeg),
        "image/jpg" => Some(image::ImageFormat::Jpeg),
        _ => None,
    }
}

pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
