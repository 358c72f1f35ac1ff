use crate::ocr::{MergedRegion, RawDetection, Rect};

use super::geom::union_rect;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// Fixed pixel tolerance between an open region's top edge and the next
    /// detection's top edge. It does not scale with font size, so tall headline
    /// text and small body text share one band.
    pub y_tolerance: f32,
    /// Detections must be strictly wider and taller than this to survive.
    pub min_box_size: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 8.0,
            min_box_size: 12.0,
        }
    }
}

/// Greedy line grouping. The `(y, x)` reading-order sort happens here, so
/// callers may pass detections in any order.
pub fn merge_regions(detections: &[RawDetection], config: &MergeConfig) -> Vec<MergedRegion> {
    let mut boxes: Vec<(Rect, &str)> = detections
        .iter()
        .map(|detection| (detection.rect(), detection.text.as_str()))
        .filter(|(rect, text)| is_detection_kept(rect, text, config))
        .collect();
    boxes.sort_by(|(a, _), (b, _)| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let mut merged: Vec<MergedRegion> = Vec::new();
    for (rect, text) in boxes {
        if let Some(open) = merged.last_mut()
            && (open.rect.y - rect.y).abs() < config.y_tolerance
        {
            open.text.push_str(text);
            open.rect = union_rect(&open.rect, &rect);
            continue;
        }
        merged.push(MergedRegion {
            text: text.to_string(),
            rect,
        });
    }
    merged
}

fn is_detection_kept(rect: &Rect, text: &str, config: &MergeConfig) -> bool {
    !text.trim().is_empty() && rect.width > config.min_box_size && rect.height > config.min_box_size
}
