use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use super::store::EditorStore;
use super::types::{ItemDefaults, TextItem, image_dimensions};
use crate::data::{decode_base64, sniff_mime};
use crate::server::AnalyzeEnvelope;

/// "Is translating" flag. Only one translate request may be in flight; the
/// guard releases the flag when dropped.
#[derive(Debug, Clone, Default)]
pub struct TranslateGate {
    busy: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct TranslateGuard {
    busy: Arc<AtomicBool>,
}

impl TranslateGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self) -> Option<TranslateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TranslateGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_translating(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for TranslateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Applies an analysis response to the store. A non-success envelope is an
/// error and leaves the store untouched. Each result replaces the item list of
/// its image; results for unknown images are skipped. Returns how many images
/// were updated.
pub fn ingest_analysis(
    store: &mut EditorStore,
    envelope: &AnalyzeEnvelope,
    defaults: &ItemDefaults,
) -> Result<usize> {
    if !envelope.is_success() {
        return Err(anyhow!("analysis failed: {}", envelope.message));
    }
    let data = envelope
        .data
        .as_ref()
        .ok_or_else(|| anyhow!("analysis response has no data"))?;

    let mut updated = 0;
    for result in &data.results {
        let items = result
            .boxes
            .iter()
            .map(|analyzed| TextItem::from_analyzed(analyzed, defaults))
            .collect::<Vec<_>>();
        let count = items.len();
        if !store.set_items_for_image(&result.image_id, items) {
            debug!("ingest: skipping result for unknown image {}", result.image_id);
            continue;
        }
        updated += 1;
        info!("ingest {}: {} items", result.image_id, count);

        if let Some(inpainted) = result.inpainted_image.as_deref()
            && inpainted.starts_with("data:")
            && let Err(err) = apply_inline_background(store, &result.image_id, inpainted)
        {
            warn!(
                "ingest {}: ignoring inpainted image: {:#}",
                result.image_id, err
            );
        }
    }
    Ok(updated)
}

fn apply_inline_background(store: &mut EditorStore, image_id: &str, url: &str) -> Result<()> {
    let bytes = decode_base64(url)?;
    let mime = sniff_mime(&bytes).ok_or_else(|| anyhow!("unsupported image payload"))?;
    let size = image_dimensions(&bytes)?;
    store.replace_background(image_id, bytes, mime, Some(size));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ImageAnalysis;
    use crate::data::{PNG_MIME, data_url};
    use crate::editor::store::tests::{image, item};
    use crate::ocr::Rect;
    use crate::test_util::png_bytes;
    use crate::translations::AnalyzedTextBox;

    fn analysis(image_id: &str, inpainted: Option<String>) -> ImageAnalysis {
        ImageAnalysis {
            image_id: image_id.to_string(),
            width: 800,
            height: 600,
            boxes: vec![AnalyzedTextBox {
                id: format!("{}-0", image_id),
                bbox: Rect::new(50.0, 50.0, 200.0, 30.0),
                original: "欢迎".to_string(),
                translated: "환영".to_string(),
                font_size: Some(24.0),
                color: None,
            }],
            mask_image: data_url(PNG_MIME, b"mask"),
            inpainted_image: inpainted,
        }
    }

    fn store() -> EditorStore {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a"), image("b")]);
        store.set_items_for_image("b", vec![item("b-0", 1.0)]);
        store
    }

    #[test]
    fn gate_refuses_reentry_until_released() {
        let gate = TranslateGate::new();
        let guard = gate.try_begin().unwrap();
        assert!(gate.is_translating());
        assert!(gate.clone().try_begin().is_none());
        drop(guard);
        assert!(!gate.is_translating());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn success_replaces_items_per_image() {
        let mut store = store();
        let envelope = AnalyzeEnvelope::success(vec![analysis("a", None), analysis("zzz", None)]);
        let updated = ingest_analysis(&mut store, &envelope, &ItemDefaults::default()).unwrap();
        assert_eq!(updated, 1);

        let items = store.items_for_image("a");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].translated, "환영");
        assert_eq!(items[0].color.as_deref(), Some("#111111"));
        assert_eq!(items[0].blur, 16.0);
        assert_eq!(store.items_for_image("b").len(), 1);
    }

    #[test]
    fn error_envelope_leaves_store_untouched() {
        let mut store = store();
        let before = store.items_for_image("b").to_vec();
        let err = ingest_analysis(
            &mut store,
            &AnalyzeEnvelope::error("quota exceeded"),
            &ItemDefaults::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(store.items_for_image("b"), before.as_slice());
        assert!(store.items_for_image("a").is_empty());

        let mut empty = AnalyzeEnvelope::success(Vec::new());
        empty.data = None;
        assert!(ingest_analysis(&mut store, &empty, &ItemDefaults::default()).is_err());
    }

    #[test]
    fn inline_inpainted_images_replace_the_background() {
        let mut store = store();
        let inline = data_url(PNG_MIME, &png_bytes(20, 10));
        let envelope = AnalyzeEnvelope::success(vec![
            analysis("a", Some(inline)),
            analysis("b", Some("https://cdn.test/b.png".to_string())),
        ]);
        ingest_analysis(&mut store, &envelope, &ItemDefaults::default()).unwrap();

        let a = store.image("a").unwrap();
        assert_eq!((a.width, a.height), (20, 10));
        let b = store.image("b").unwrap();
        assert_eq!((b.width, b.height), (800, 600));
        assert!(b.bytes.is_empty());
    }
}
