use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use super::render::render_scene;
use super::scene::{
    BaseImage, BlurOverlay, CanvasObject, TextObject, blur_overlay, build_scene, overlay_clip,
};
use super::store::EditorStore;
use super::types::{BoundingBox, EditorImage, TextItem, image_dimensions};

const MIN_FONT_SIZE: f32 = 1.0;
const MAX_FONT_SIZE: f32 = 200.0;
const MAX_BLUR: f32 = 60.0;
const LINE_HEIGHT: f32 = 1.16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasState {
    Uninitialized,
    Loading { image_id: String, generation: u64 },
    Ready { image_id: String, generation: u64 },
}

/// Handle for one in-flight background load. Only the ticket of the latest
/// activation can complete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub image_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformChange {
    Move { left: f32, top: f32 },
    Scale { scale_x: f32 },
    Rotate { angle: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Other,
}

/// Owns the visual objects for the active image. Interim edits only touch
/// these objects; commits write back through [`EditorStore::update_item`]
/// and rebuild the scene from the store.
#[derive(Debug, Clone)]
pub struct CanvasController {
    state: CanvasState,
    generation: u64,
    base: Option<BaseImage>,
    objects: Vec<CanvasObject>,
    selected: Option<String>,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasController {
    pub fn new() -> Self {
        Self {
            state: CanvasState::Uninitialized,
            generation: 0,
            base: None,
            objects: Vec::new(),
            selected: None,
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    pub fn selected_item_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn text_object(&self, item_id: &str) -> Option<&TextObject> {
        self.objects.iter().find_map(|object| match object {
            CanvasObject::Text(text) if text.item_id == item_id => Some(text),
            _ => None,
        })
    }

    pub fn overlay(&self, item_id: &str) -> Option<&BlurOverlay> {
        self.objects.iter().find_map(|object| match object {
            CanvasObject::Overlay(overlay) if overlay.item_id == item_id => Some(overlay),
            _ => None,
        })
    }

    /// Tears down the current scene and starts loading the store's active
    /// image. Returns `None` (and resets) when there is no active image.
    pub fn activate(&mut self, store: &EditorStore) -> Option<LoadTicket> {
        self.objects.clear();
        self.base = None;
        self.selected = None;
        self.generation += 1;
        let Some(image_id) = store.active_image_id() else {
            self.state = CanvasState::Uninitialized;
            return None;
        };
        debug!("canvas: loading {} (generation {})", image_id, self.generation);
        self.state = CanvasState::Loading {
            image_id: image_id.to_string(),
            generation: self.generation,
        };
        Some(LoadTicket {
            image_id: image_id.to_string(),
            generation: self.generation,
        })
    }

    /// Completes a load. Stale tickets are dropped; failures are logged and
    /// leave the controller in `Loading` until the next activation.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<BaseImage>,
        store: &EditorStore,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                "canvas: dropping stale load of {} (generation {} < {})",
                ticket.image_id, ticket.generation, self.generation
            );
            return false;
        }
        let base = match result {
            Ok(base) => base,
            Err(err) => {
                warn!("canvas: failed to load {}: {:#}", ticket.image_id, err);
                return false;
            }
        };
        self.base = Some(base);
        self.state = CanvasState::Ready {
            image_id: ticket.image_id.clone(),
            generation: ticket.generation,
        };
        self.rebuild(store);
        true
    }

    /// Activates and loads the active image in one step.
    pub async fn load_active(&mut self, store: &EditorStore) -> Result<bool> {
        let Some(ticket) = self.activate(store) else {
            return Ok(false);
        };
        let image = store
            .image(&ticket.image_id)
            .cloned()
            .ok_or_else(|| anyhow!("image {} disappeared", ticket.image_id))?;
        let result = load_base(image).await;
        Ok(self.finish_load(&ticket, result, store))
    }

    /// Rebuilds the scene after the store's item list changed. Returns `false`
    /// when the store's active image is not the one on the canvas; call
    /// [`CanvasController::activate`] then.
    pub fn sync(&mut self, store: &EditorStore) -> bool {
        match self.ready_image_id() {
            Some(image_id) if store.active_image_id() == Some(image_id) => {
                self.rebuild(store);
                true
            }
            _ => false,
        }
    }

    /// Selecting another object ends a running edit, which commits it.
    pub fn select_item(&mut self, store: &mut EditorStore, item_id: &str) -> bool {
        if self.text_object(item_id).is_none() {
            return false;
        }
        if self.selected.as_deref() != Some(item_id) {
            self.on_editing_exited(store);
        }
        if self.text_object(item_id).is_none() {
            return false;
        }
        self.selected = Some(item_id.to_string());
        true
    }

    pub fn clear_selection(&mut self, store: &mut EditorStore) {
        self.on_editing_exited(store);
        self.selected = None;
    }

    /// Clicking the background deselects.
    pub fn select_base(&mut self, store: &mut EditorStore) {
        self.clear_selection(store);
    }

    pub fn begin_editing(&mut self) -> bool {
        self.with_selected_text(|text| text.editing = true)
    }

    pub fn is_editing(&self) -> bool {
        self.selected
            .as_deref()
            .and_then(|item_id| self.text_object(item_id))
            .is_some_and(|text| text.editing)
    }

    /// Live typing. Only the canvas objects change; the text box grows to fit
    /// its lines and the height is kept on commit.
    pub fn on_text_changed(&mut self, value: &str) -> bool {
        if !self.is_editing() {
            return false;
        }
        let changed = self.with_selected_text(|text| {
            text.text = value.to_string();
            let lines = value.split('\n').count().max(1) as f32;
            text.height = text.height.max(lines * text.font_size * LINE_HEIGHT);
        });
        if changed {
            self.refresh_selected_clip();
        }
        changed
    }

    /// Interim move, resize or rotate of the selected text.
    pub fn transform_text(&mut self, change: TransformChange) -> bool {
        let changed = self.with_selected_text(|text| match change {
            TransformChange::Move { left, top } => {
                text.left = left;
                text.top = top;
            }
            TransformChange::Scale { scale_x } => text.scale_x = scale_x,
            TransformChange::Rotate { angle } => text.angle = angle,
        });
        if changed {
            self.refresh_selected_clip();
        }
        changed
    }

    /// Leaves text editing and writes text, box and angle to the store.
    pub fn on_editing_exited(&mut self, store: &mut EditorStore) -> bool {
        let Some(text) = self.selected_text().cloned() else {
            return false;
        };
        if !text.editing {
            return false;
        }
        self.with_selected_text(|text| text.editing = false);
        self.commit(store, &text)
    }

    /// Transform release: writes box and angle, folding the horizontal scale
    /// into the width. Mid-edit, the interim text is written too and editing
    /// continues.
    pub fn on_transform_committed(&mut self, store: &mut EditorStore) -> bool {
        let Some(text) = self.selected_text().cloned() else {
            return false;
        };
        self.commit(store, &text)
    }

    pub fn set_font_size(&mut self, store: &mut EditorStore, value: f32) -> bool {
        let size = value.round().clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self.update_style(store, |item| item.font_size = Some(size))
    }

    pub fn set_padding(&mut self, store: &mut EditorStore, value: f32) -> bool {
        let padding = value.round().max(0.0);
        self.update_style(store, |item| item.padding = Some(padding))
    }

    pub fn set_blur(&mut self, store: &mut EditorStore, value: f32) -> bool {
        let blur = value.round().clamp(0.0, MAX_BLUR);
        self.update_style(store, |item| item.blur = blur)
    }

    pub fn on_key(&mut self, store: &mut EditorStore, key: Key) -> bool {
        match key {
            Key::Delete | Key::Backspace => self.delete_selected(store),
            Key::Other => false,
        }
    }

    /// Removes the selected item. Refused while its text is being edited.
    pub fn delete_selected(&mut self, store: &mut EditorStore) -> bool {
        if self.is_editing() {
            debug!("canvas: delete refused while editing");
            return false;
        }
        let (Some(image_id), Some(item_id)) =
            (self.ready_image_id().map(str::to_string), self.selected.clone())
        else {
            return false;
        };
        self.selected = None;
        let removed = store.remove_item(&image_id, &item_id);
        self.rebuild(store);
        removed
    }

    /// Renders base, overlays and text to `output_mime` bytes.
    pub fn export(&self, output_mime: &str) -> Result<Vec<u8>> {
        if !matches!(self.state, CanvasState::Ready { .. }) {
            return Err(anyhow!("canvas is not ready"));
        }
        render_scene(&self.objects, output_mime).with_context(|| "failed to export canvas")
    }

    fn ready_image_id(&self) -> Option<&str> {
        match &self.state {
            CanvasState::Ready { image_id, .. } => Some(image_id),
            _ => None,
        }
    }

    /// Rebuilds from the store. A running edit survives with its interim text.
    fn rebuild(&mut self, store: &EditorStore) {
        let pending = self.selected_text().filter(|text| text.editing).cloned();
        let (Some(base), Some(image_id)) = (self.base.as_ref(), self.ready_image_id()) else {
            return;
        };
        self.objects = build_scene(base, store.items_for_image(image_id));
        if let Some(item_id) = self.selected.take()
            && self.text_object(&item_id).is_some()
        {
            self.selected = Some(item_id);
        }
        if let Some(pending) = pending
            && self.selected.as_deref() == Some(pending.item_id.as_str())
        {
            self.with_selected_text(|text| {
                text.editing = true;
                text.height = text.height.max(pending.height);
                text.text = pending.text;
            });
            self.refresh_selected_clip();
        }
    }

    fn selected_text(&self) -> Option<&TextObject> {
        self.selected
            .as_deref()
            .and_then(|item_id| self.text_object(item_id))
    }

    fn with_selected_text<F>(&mut self, apply: F) -> bool
    where
        F: FnOnce(&mut TextObject),
    {
        let Some(item_id) = self.selected.as_deref() else {
            return false;
        };
        let text = self.objects.iter_mut().find_map(|object| match object {
            CanvasObject::Text(text) if text.item_id == item_id => Some(text),
            _ => None,
        });
        match text {
            Some(text) => {
                apply(text);
                true
            }
            None => false,
        }
    }

    fn refresh_selected_clip(&mut self) {
        let Some(text) = self.selected_text().cloned() else {
            return;
        };
        for object in &mut self.objects {
            if let CanvasObject::Overlay(overlay) = object
                && overlay.item_id == text.item_id
            {
                overlay.clip = overlay_clip(
                    text.left,
                    text.top,
                    text.scaled_width(),
                    text.height * text.scale_y,
                    overlay.padding,
                    text.angle,
                );
            }
        }
    }

    fn commit(&mut self, store: &mut EditorStore, text: &TextObject) -> bool {
        let Some(image_id) = self.ready_image_id().map(str::to_string) else {
            return false;
        };
        let written = store.update_item(&image_id, &text.item_id, |mut item| {
            if text.editing {
                item.translated = text.text.clone();
            }
            let width = if text.width > 0.0 {
                text.scaled_width()
            } else {
                item.bbox.width
            };
            item.bbox = BoundingBox {
                x: text.left.round(),
                y: text.top.round(),
                width: width.round(),
                height: (text.height * text.scale_y).round().max(item.bbox.height),
                angle: item.bbox.angle,
            };
            item.angle = Some(text.angle.round());
            item
        });
        if written {
            debug!("canvas: committed {}", text.item_id);
            self.rebuild(store);
        }
        written
    }

    fn update_style<F>(&mut self, store: &mut EditorStore, apply: F) -> bool
    where
        F: Fn(&mut TextItem),
    {
        let (Some(image_id), Some(item_id)) =
            (self.ready_image_id().map(str::to_string), self.selected.clone())
        else {
            return false;
        };
        let Some(mut preview) = store.item(&image_id, &item_id).cloned() else {
            return false;
        };
        apply(&mut preview);
        self.apply_item_visuals(&preview);
        store.update_item(&image_id, &item_id, |mut item| {
            apply(&mut item);
            item
        })
    }

    fn apply_item_visuals(&mut self, item: &TextItem) {
        let fresh = blur_overlay(item);
        let font_size = item.effective_font_size();
        let geometry = self.text_object(&item.id).map(|text| {
            (
                text.left,
                text.top,
                text.scaled_width(),
                text.height * text.scale_y,
                text.angle,
            )
        });
        for object in &mut self.objects {
            match object {
                CanvasObject::Overlay(overlay) if overlay.item_id == item.id => {
                    overlay.padding = fresh.padding;
                    overlay.blur = fresh.blur;
                    overlay.strength = fresh.strength;
                    if let Some((left, top, width, height, angle)) = geometry {
                        overlay.clip = overlay_clip(left, top, width, height, overlay.padding, angle);
                    }
                }
                CanvasObject::Text(text) if text.item_id == item.id => text.font_size = font_size,
                _ => {}
            }
        }
    }
}

/// Decodes the image header off the async runtime and produces the base layer.
pub async fn load_base(image: EditorImage) -> Result<BaseImage> {
    let bytes = image.bytes.clone();
    let (width, height) = tokio::task::spawn_blocking(move || image_dimensions(&bytes))
        .await
        .with_context(|| "image decode task failed")??;
    let mut base = BaseImage::from_image(&image);
    base.width = width;
    base.height = height;
    Ok(base)
}

/// `{stem}-translated.png`, with `image` standing in for an empty stem.
pub fn export_file_name(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(index) => &name[..index],
        None => name,
    };
    let stem = if stem.trim().is_empty() { "image" } else { stem };
    format!("{}-translated.png", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::store::tests::{image, item};
    use crate::test_util::png_bytes;

    fn store_with_items() -> EditorStore {
        let mut first = image("a");
        first.bytes = png_bytes(80, 60);
        let mut second = image("b");
        second.bytes = png_bytes(40, 30);
        let mut store = EditorStore::new();
        store.set_images(vec![first, second]);
        store.set_items_for_image("a", vec![item("a-0", 10.0), item("a-1", 300.0)]);
        store
    }

    async fn ready(store: &EditorStore) -> CanvasController {
        let mut canvas = CanvasController::new();
        assert!(canvas.load_active(store).await.unwrap());
        canvas
    }

    #[tokio::test]
    async fn loads_the_active_image() {
        let store = store_with_items();
        let canvas = ready(&store).await;
        assert_eq!(
            canvas.state(),
            &CanvasState::Ready {
                image_id: "a".to_string(),
                generation: 1
            }
        );
        assert_eq!(canvas.objects().len(), 5);
        match &canvas.objects()[0] {
            CanvasObject::Base(base) => assert_eq!((base.width, base.height), (80, 60)),
            other => panic!("unexpected first object {:?}", other),
        }
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut store = store_with_items();
        let mut canvas = CanvasController::new();
        let first = canvas.activate(&store).unwrap();
        store.set_active_image("b");
        let second = canvas.activate(&store).unwrap();

        let base = BaseImage::from_image(store.image("a").unwrap());
        assert!(!canvas.finish_load(&first, Ok(base), &store));
        assert_eq!(
            canvas.state(),
            &CanvasState::Loading {
                image_id: "b".to_string(),
                generation: 2
            }
        );
        assert!(canvas.objects().is_empty());

        let base = BaseImage::from_image(store.image("b").unwrap());
        assert!(canvas.finish_load(&second, Ok(base), &store));
        assert!(matches!(canvas.state(), CanvasState::Ready { image_id, .. } if image_id == "b"));
    }

    #[tokio::test]
    async fn failed_load_stays_loading_until_reactivated() {
        let mut store = store_with_items();
        store.replace_background("a", b"not an image".to_vec(), "image/png", None);
        let mut canvas = CanvasController::new();
        assert!(!canvas.load_active(&store).await.unwrap());
        assert!(matches!(canvas.state(), CanvasState::Loading { .. }));
        assert!(canvas.export("image/png").is_err());

        store.set_active_image("b");
        assert!(canvas.load_active(&store).await.unwrap());
        assert!(matches!(canvas.state(), CanvasState::Ready { image_id, .. } if image_id == "b"));
    }

    #[tokio::test]
    async fn live_typing_does_not_touch_the_store() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        assert!(canvas.select_item(&mut store, "a-0"));
        assert!(canvas.begin_editing());
        assert!(canvas.on_text_changed("줄 하나\n줄 둘"));

        assert_eq!(canvas.text_object("a-0").unwrap().text, "줄 하나\n줄 둘");
        assert_eq!(store.item("a", "a-0").unwrap().translated, "안녕");
        // Two 24px lines outgrow the 30px box; the clip follows.
        let clip = canvas.overlay("a-0").unwrap().clip;
        assert!(clip.height > 46.0);
    }

    #[tokio::test]
    async fn exiting_edit_commits_text_and_box() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("반가워요");
        canvas.transform_text(TransformChange::Move {
            left: 20.4,
            top: 61.6,
        });
        canvas.transform_text(TransformChange::Rotate { angle: 14.7 });

        assert!(canvas.on_editing_exited(&mut store));
        let item = store.item("a", "a-0").unwrap();
        assert_eq!(item.translated, "반가워요");
        assert_eq!(item.bbox.x, 20.0);
        assert_eq!(item.bbox.y, 62.0);
        assert_eq!(item.bbox.width, 200.0);
        assert_eq!(item.bbox.height, 30.0);
        assert_eq!(item.angle, Some(15.0));
        assert!(!canvas.is_editing());
        assert_eq!(canvas.selected_item_id(), Some("a-0"));
        assert_eq!(canvas.text_object("a-0").unwrap().left, 20.0);
    }

    #[tokio::test]
    async fn transform_commit_folds_scale_into_width() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-1");
        canvas.transform_text(TransformChange::Scale { scale_x: 1.5 });
        assert_eq!(store.item("a", "a-1").unwrap().bbox.width, 200.0);

        assert!(canvas.on_transform_committed(&mut store));
        let item = store.item("a", "a-1").unwrap();
        assert_eq!(item.bbox.width, 300.0);
        assert_eq!(item.bbox.height, 30.0);
        let text = canvas.text_object("a-1").unwrap();
        assert_eq!((text.scale_x, text.scale_y), (1.0, 1.0));
        assert_eq!(text.width, 300.0);
    }

    #[tokio::test]
    async fn style_controls_clamp_and_write_through() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        assert!(!canvas.set_font_size(&mut store, 30.0));

        canvas.select_item(&mut store, "a-0");
        assert!(canvas.set_font_size(&mut store, 512.0));
        assert!(canvas.set_padding(&mut store, -4.0));
        assert!(canvas.set_blur(&mut store, 44.6));

        let item = store.item("a", "a-0").unwrap();
        assert_eq!(item.font_size, Some(200.0));
        assert_eq!(item.padding, Some(0.0));
        assert_eq!(item.blur, 45.0);
        assert_eq!(canvas.text_object("a-0").unwrap().font_size, 200.0);
        let overlay = canvas.overlay("a-0").unwrap();
        assert_eq!(overlay.clip.x, 10.0);
        assert_eq!(overlay.strength, 1.0);

        canvas.set_blur(&mut store, 99.0);
        canvas.set_font_size(&mut store, 0.2);
        let item = store.item("a", "a-0").unwrap();
        assert_eq!(item.blur, 60.0);
        assert_eq!(item.font_size, Some(1.0));
    }

    #[tokio::test]
    async fn delete_is_refused_mid_edit() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        assert!(!canvas.on_key(&mut store, Key::Delete));

        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        assert!(!canvas.on_key(&mut store, Key::Backspace));
        assert!(!canvas.delete_selected(&mut store));
        assert_eq!(store.items_for_image("a").len(), 2);

        canvas.on_editing_exited(&mut store);
        assert!(!canvas.on_key(&mut store, Key::Other));
        assert!(canvas.on_key(&mut store, Key::Backspace));
        assert_eq!(store.items_for_image("a").len(), 1);
        assert_eq!(canvas.selected_item_id(), None);
        assert!(canvas.text_object("a-0").is_none());
    }

    #[tokio::test]
    async fn sync_reselects_surviving_items() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-1");
        store.update_item("a", "a-1", |mut item| {
            item.translated = "갱신".to_string();
            item
        });
        assert!(canvas.sync(&store));
        assert_eq!(canvas.selected_item_id(), Some("a-1"));
        assert_eq!(canvas.text_object("a-1").unwrap().text, "갱신");

        store.set_items_for_image("a", vec![item("a-0", 10.0)]);
        assert!(canvas.sync(&store));
        assert_eq!(canvas.selected_item_id(), None);

        store.set_active_image("b");
        assert!(!canvas.sync(&store));
    }

    #[tokio::test]
    async fn selecting_the_base_clears_selection() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        assert!(!canvas.select_item(&mut store, "missing"));
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("배경 클릭");
        canvas.select_base(&mut store);
        assert_eq!(canvas.selected_item_id(), None);
        assert!(!canvas.text_object("a-0").unwrap().editing);
        assert_eq!(store.item("a", "a-0").unwrap().translated, "배경 클릭");
        assert_eq!(canvas.text_object("a-0").unwrap().text, "배경 클릭");
    }

    #[tokio::test]
    async fn typing_requires_an_edit_session() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        assert!(!canvas.on_text_changed("무시"));
        assert_eq!(canvas.text_object("a-0").unwrap().text, "안녕");
    }

    #[tokio::test]
    async fn selecting_another_item_commits_the_edit() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("새 번역");

        assert!(canvas.select_item(&mut store, "a-1"));
        assert_eq!(canvas.selected_item_id(), Some("a-1"));
        assert_eq!(store.item("a", "a-0").unwrap().translated, "새 번역");
        assert!(!canvas.text_object("a-0").unwrap().editing);

        canvas.transform_text(TransformChange::Move {
            left: 320.0,
            top: 80.0,
        });
        assert!(canvas.on_transform_committed(&mut store));
        assert_eq!(store.item("a", "a-0").unwrap().translated, "새 번역");
        assert_eq!(canvas.text_object("a-0").unwrap().text, "새 번역");
        assert_eq!(store.item("a", "a-1").unwrap().bbox.x, 320.0);
    }

    #[tokio::test]
    async fn multi_line_edits_keep_their_overlay_after_exit() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("하나\n둘\n셋");
        let editing_clip = canvas.overlay("a-0").unwrap().clip;
        assert!((editing_clip.height - 99.52).abs() < 1e-3);

        assert!(canvas.on_editing_exited(&mut store));
        assert_eq!(store.item("a", "a-0").unwrap().bbox.height, 84.0);
        assert_eq!(canvas.text_object("a-0").unwrap().height, 84.0);
        let clip = canvas.overlay("a-0").unwrap().clip;
        assert_eq!(clip.height, 100.0);
        assert!(clip.height >= editing_clip.height);
    }

    #[tokio::test]
    async fn transform_commit_mid_edit_keeps_the_session() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("이동 중");
        canvas.transform_text(TransformChange::Move {
            left: 30.0,
            top: 70.0,
        });

        assert!(canvas.on_transform_committed(&mut store));
        let item = store.item("a", "a-0").unwrap();
        assert_eq!((item.bbox.x, item.bbox.y), (30.0, 70.0));
        assert_eq!(item.translated, "이동 중");
        assert!(canvas.is_editing());
        assert_eq!(canvas.text_object("a-0").unwrap().text, "이동 중");

        canvas.on_text_changed("이동 완료");
        assert!(canvas.on_editing_exited(&mut store));
        assert_eq!(store.item("a", "a-0").unwrap().translated, "이동 완료");
    }

    #[tokio::test]
    async fn sync_mid_edit_keeps_interim_text() {
        let mut store = store_with_items();
        let mut canvas = ready(&store).await;
        canvas.select_item(&mut store, "a-0");
        canvas.begin_editing();
        canvas.on_text_changed("첫 줄\n둘째 줄");
        let clip = canvas.overlay("a-0").unwrap().clip;

        store.update_item("a", "a-1", |mut item| {
            item.blur = 30.0;
            item
        });
        assert!(canvas.sync(&store));
        assert!(canvas.is_editing());
        assert_eq!(canvas.text_object("a-0").unwrap().text, "첫 줄\n둘째 줄");
        assert_eq!(canvas.overlay("a-0").unwrap().clip, clip);
        assert_eq!(canvas.overlay("a-1").unwrap().blur, 30.0);

        canvas.on_editing_exited(&mut store);
        assert_eq!(store.item("a", "a-0").unwrap().translated, "첫 줄\n둘째 줄");
    }

    #[tokio::test]
    async fn exports_png_at_image_size() {
        let store = store_with_items();
        let canvas = ready(&store).await;
        let bytes = canvas.export("image/png").unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (80, 60));
    }

    #[test]
    fn export_names_keep_the_stem() {
        assert_eq!(export_file_name("poster.final.jpg"), "poster.final-translated.png");
        assert_eq!(export_file_name("menu"), "menu-translated.png");
        assert_eq!(export_file_name(".png"), "image-translated.png");
        assert_eq!(export_file_name(""), "image-translated.png");
    }
}
