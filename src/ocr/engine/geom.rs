use crate::ocr::{Polygon, Rect};

pub fn polygon_to_rect(polygon: &Polygon) -> Rect {
    let points = polygon.points();
    let mut x1 = f32::INFINITY;
    let mut y1 = f32::INFINITY;
    let mut x2 = f32::NEG_INFINITY;
    let mut y2 = f32::NEG_INFINITY;
    for point in points {
        x1 = x1.min(point.x);
        y1 = y1.min(point.y);
        x2 = x2.max(point.x);
        y2 = y2.max(point.y);
    }
    Rect {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    }
}

pub fn union_rect(a: &Rect, b: &Rect) -> Rect {
    let x1 = a.x.min(b.x);
    let y1 = a.y.min(b.y);
    let x2 = a.right().max(b.right());
    let y2 = a.bottom().max(b.bottom());
    Rect {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    }
}

/// Grows `rect` by `padding` on every side.
pub fn pad_rect(rect: &Rect, padding: f32) -> Rect {
    Rect {
        x: rect.x - padding,
        y: rect.y - padding,
        width: rect.width + padding * 2.0,
        height: rect.height + padding * 2.0,
    }
}

/// Clamps the origin into `[0, width] x [0, height]`, then shrinks the size so the
/// rectangle never extends past the image.
pub fn clamp_rect(rect: &Rect, width: f32, height: f32) -> Rect {
    let x = rect.x.clamp(0.0, width);
    let y = rect.y.clamp(0.0, height);
    Rect {
        x,
        y,
        width: rect.width.clamp(0.0, (width - x).max(0.0)),
        height: rect.height.clamp(0.0, (height - y).max(0.0)),
    }
}
