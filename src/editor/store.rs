use std::collections::HashMap;
use tracing::debug;

use super::types::{EditorImage, TextItem};

/// Images, the active image and per-image overlay items. Every mutation is a
/// single `&mut self` call; ids that do not exist turn the call into a no-op
/// reported as `false`.
#[derive(Debug, Clone, Default)]
pub struct EditorStore {
    images: Vec<EditorImage>,
    active_image_id: Option<String>,
    items_by_image_id: HashMap<String, Vec<TextItem>>,
}

impl EditorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the image list and activates the first image. Items of images
    /// that are no longer present are dropped.
    pub fn set_images(&mut self, images: Vec<EditorImage>) {
        self.active_image_id = images.first().map(|image| image.id.clone());
        self.items_by_image_id
            .retain(|image_id, _| images.iter().any(|image| &image.id == image_id));
        self.images = images;
    }

    /// Appends uploads; the first of them becomes active when nothing is.
    pub fn add_images(&mut self, images: Vec<EditorImage>) {
        if self.active_image_id.is_none() {
            self.active_image_id = images.first().map(|image| image.id.clone());
        }
        self.images.extend(images);
    }

    pub fn set_active_image(&mut self, image_id: &str) -> bool {
        if !self.has_image(image_id) {
            debug!("store: ignoring activation of unknown image {}", image_id);
            return false;
        }
        self.active_image_id = Some(image_id.to_string());
        true
    }

    pub fn set_items_for_image(&mut self, image_id: &str, items: Vec<TextItem>) -> bool {
        if !self.has_image(image_id) {
            debug!("store: ignoring items for unknown image {}", image_id);
            return false;
        }
        self.items_by_image_id.insert(image_id.to_string(), items);
        true
    }

    /// Applies `updater` to one item. The item keeps its id whatever the
    /// updater returns.
    pub fn update_item<F>(&mut self, image_id: &str, item_id: &str, updater: F) -> bool
    where
        F: FnOnce(TextItem) -> TextItem,
    {
        let Some(item) = self
            .items_by_image_id
            .get_mut(image_id)
            .and_then(|items| items.iter_mut().find(|item| item.id == item_id))
        else {
            return false;
        };
        let mut updated = updater(item.clone());
        updated.id = item.id.clone();
        *item = updated;
        true
    }

    pub fn remove_item(&mut self, image_id: &str, item_id: &str) -> bool {
        let Some(items) = self.items_by_image_id.get_mut(image_id) else {
            return false;
        };
        let before = items.len();
        items.retain(|item| item.id != item_id);
        items.len() != before
    }

    /// Swaps the background payload of one image, e.g. for an inpainted
    /// version. Id, name and items stay untouched.
    pub fn replace_background(
        &mut self,
        image_id: &str,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        size: Option<(u32, u32)>,
    ) -> bool {
        let Some(image) = self.images.iter_mut().find(|image| image.id == image_id) else {
            return false;
        };
        image.bytes = bytes;
        image.mime_type = mime_type.into();
        if let Some((width, height)) = size {
            image.width = width;
            image.height = height;
        }
        true
    }

    pub fn images(&self) -> &[EditorImage] {
        &self.images
    }

    pub fn image(&self, image_id: &str) -> Option<&EditorImage> {
        self.images.iter().find(|image| image.id == image_id)
    }

    pub fn active_image_id(&self) -> Option<&str> {
        self.active_image_id.as_deref()
    }

    pub fn active_image(&self) -> Option<&EditorImage> {
        self.active_image_id
            .as_deref()
            .and_then(|image_id| self.image(image_id))
    }

    pub fn items_for_image(&self, image_id: &str) -> &[TextItem] {
        self.items_by_image_id
            .get(image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn item(&self, image_id: &str, item_id: &str) -> Option<&TextItem> {
        self.items_for_image(image_id)
            .iter()
            .find(|item| item.id == item_id)
    }

    fn has_image(&self, image_id: &str) -> bool {
        self.images.iter().any(|image| image.id == image_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::editor::types::BoundingBox;

    pub(crate) fn image(id: &str) -> EditorImage {
        EditorImage {
            id: id.to_string(),
            name: format!("{}.png", id),
            mime_type: "image/png".to_string(),
            bytes: Vec::new(),
            width: 800,
            height: 600,
        }
    }

    pub(crate) fn item(id: &str, x: f32) -> TextItem {
        TextItem {
            id: id.to_string(),
            bbox: BoundingBox {
                x,
                y: 50.0,
                width: 200.0,
                height: 30.0,
                angle: None,
            },
            original: "你好".to_string(),
            translated: "안녕".to_string(),
            font_size: Some(24.0),
            blur: 16.0,
            visible: true,
            color: Some("#000000".to_string()),
            angle: None,
            padding: Some(8.0),
        }
    }

    #[test]
    fn set_images_activates_the_first_image() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a"), image("b")]);
        assert_eq!(store.active_image_id(), Some("a"));
        store.set_images(Vec::new());
        assert_eq!(store.active_image_id(), None);
        assert!(store.active_image().is_none());
    }

    #[test]
    fn unknown_active_image_is_ignored() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a"), image("b")]);
        assert!(!store.set_active_image("zzz"));
        assert_eq!(store.active_image_id(), Some("a"));
        assert!(store.set_active_image("b"));
        assert_eq!(store.active_image().map(|image| image.name.as_str()), Some("b.png"));
    }

    #[test]
    fn clearing_one_image_leaves_others_alone() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a"), image("b")]);
        store.set_items_for_image("a", vec![item("a-0", 10.0)]);
        store.set_items_for_image("b", vec![item("b-0", 10.0), item("b-1", 20.0)]);
        assert!(store.set_items_for_image("a", Vec::new()));
        assert!(store.items_for_image("a").is_empty());
        assert_eq!(store.items_for_image("b").len(), 2);
    }

    #[test]
    fn item_lists_are_replaced_not_merged() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a")]);
        store.set_items_for_image("a", vec![item("a-0", 10.0), item("a-1", 20.0)]);
        store.set_items_for_image("a", vec![item("a-0", 99.0)]);
        assert_eq!(store.items_for_image("a").len(), 1);
        assert_eq!(store.items_for_image("a")[0].bbox.x, 99.0);
    }

    #[test]
    fn update_item_preserves_id() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a")]);
        store.set_items_for_image("a", vec![item("a-0", 10.0)]);
        let updated = store.update_item("a", "a-0", |mut item| {
            item.id = "hijacked".to_string();
            item.translated = "반가워".to_string();
            item
        });
        assert!(updated);
        let item = store.item("a", "a-0").unwrap();
        assert_eq!(item.translated, "반가워");
        assert!(store.item("a", "hijacked").is_none());
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a")]);
        store.set_items_for_image("a", vec![item("a-0", 10.0)]);
        assert!(!store.update_item("a", "missing", |item| item));
        assert!(!store.update_item("missing", "a-0", |item| item));
        assert!(!store.remove_item("a", "missing"));
        assert!(!store.set_items_for_image("missing", vec![item("x", 0.0)]));
        assert!(!store.replace_background("missing", vec![1], "image/png", None));
        assert_eq!(store.items_for_image("a").len(), 1);
        assert!(store.items_for_image("missing").is_empty());
    }

    #[test]
    fn remove_and_background_swap() {
        let mut store = EditorStore::new();
        store.set_images(vec![image("a")]);
        store.set_items_for_image("a", vec![item("a-0", 10.0), item("a-1", 20.0)]);
        assert!(store.remove_item("a", "a-0"));
        assert_eq!(store.items_for_image("a").len(), 1);

        assert!(store.replace_background("a", vec![9, 9], "image/jpeg", Some((400, 300))));
        let image = store.image("a").unwrap();
        assert_eq!(image.bytes, vec![9, 9]);
        assert_eq!((image.width, image.height), (400, 300));
        assert_eq!(image.name, "a.png");
        assert_eq!(store.items_for_image("a").len(), 1);
    }

    #[test]
    fn added_images_keep_the_current_selection() {
        let mut store = EditorStore::new();
        store.add_images(vec![image("a")]);
        assert_eq!(store.active_image_id(), Some("a"));
        store.add_images(vec![image("b")]);
        assert_eq!(store.active_image_id(), Some("a"));
        assert_eq!(store.images().len(), 2);
    }
}
