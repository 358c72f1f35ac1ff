mod inpaint;
mod storage;

use std::sync::Arc;
use tracing::warn;

use crate::settings::Settings;

pub use inpaint::{HttpInpainter, InpaintFuture, Inpainter};
pub use storage::{
    HttpStorage, LocalStorage, ObjectStorage, StorageFuture, dated_key_parts, object_key,
};

/// Storage backend named by `[storage]`: an HTTP endpoint wins over a local directory.
pub fn storage_from_settings(settings: &Settings) -> Option<Arc<dyn ObjectStorage>> {
    if let Some(endpoint) = settings.storage_endpoint.as_deref() {
        let public_host = settings
            .storage_public_host
            .clone()
            .unwrap_or_else(|| endpoint.to_string());
        return Some(Arc::new(HttpStorage::new(endpoint, public_host)));
    }
    settings
        .storage_local_dir
        .as_deref()
        .map(|dir| Arc::new(LocalStorage::new(dir)) as Arc<dyn ObjectStorage>)
}

pub fn inpainter_from_settings(settings: &Settings) -> Option<Arc<dyn Inpainter>> {
    let endpoint = settings.inpaint_endpoint.as_deref()?;
    if settings.storage_endpoint.is_none() && settings.storage_local_dir.is_none() {
        warn!("inpaint endpoint is set but no storage is configured; inpainting disabled");
        return None;
    }
    Some(Arc::new(HttpInpainter::from_env(endpoint)))
}
