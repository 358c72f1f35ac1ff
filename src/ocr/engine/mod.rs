pub(crate) mod geom;
mod merge;
mod script;

use tracing::debug;

use crate::ocr::{MergedRegion, OcrPage};

pub use merge::{MergeConfig, merge_regions};
pub use script::ScriptFilter;

/// Merges one page's detections into regions and keeps those the script filter
/// marks for translation.
pub fn extract_regions(
    page: &OcrPage,
    merge: &MergeConfig,
    filter: &ScriptFilter,
) -> Vec<MergedRegion> {
    let merged = merge_regions(&page.detections, merge);
    let merged_count = merged.len();
    let kept = filter.apply(merged);
    debug!(
        "ocr: {} detections -> {} regions -> {} translatable",
        page.detections.len(),
        merged_count,
        kept.len()
    );
    kept
}
