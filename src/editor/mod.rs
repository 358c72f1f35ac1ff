//! Overlay editing: the per-image item store, the scene derived from it, and
//! the canvas controller that turns user gestures into store commits.

mod canvas;
mod render;
mod scene;
mod session;
mod store;
mod types;

pub use canvas::{
    CanvasController, CanvasState, Key, LoadTicket, TransformChange, export_file_name, load_base,
};
pub use render::{render_scene, scene_svg};
pub use scene::{
    BaseImage, BlurOverlay, CanvasObject, ClipRect, DEFAULT_TEXT_FILL, TextObject, blur_overlay,
    blur_strength, build_scene, overlay_clip, text_object,
};
pub use session::{TranslateGate, TranslateGuard, ingest_analysis};
pub use store::EditorStore;
pub use types::{BoundingBox, DEFAULT_ITEM_PADDING, EditorImage, ItemDefaults, TextItem};
