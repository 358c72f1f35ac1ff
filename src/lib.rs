use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub mod analyzer;
pub mod data;
pub mod editor;
pub mod error;
pub mod logging;
pub mod ocr;
mod providers;
pub mod server;
pub mod services;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translations;

pub use analyzer::{AnalysisConfig, Analyzer, ImageAnalysis, ImageInput};
pub use error::{AnalyzeError, AnalyzeResult};
pub use providers::{
    Gemini, OpenAI, Provider, ProviderFuture, ProviderImpl, ProviderKind, ProviderResponse,
    ProviderUsage, provider_for,
};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<String>,
    pub mask_out: Option<String>,
    pub export_out: Option<String>,
    pub padding: Option<f32>,
    pub invert_mask: bool,
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

/// Analyzes one image file and returns the result envelope as pretty JSON.
/// Optionally writes the occlusion mask and a composited preview.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let data_path = config
        .data
        .as_deref()
        .ok_or_else(|| anyhow!("--data <image> is required"))?;

    let mut analysis_config = AnalysisConfig::from_settings(&settings)?;
    if let Some(padding) = config.padding {
        analysis_config.mask_padding = padding;
    }
    if config.invert_mask {
        analysis_config.mask_colors = analysis_config.mask_colors.inverted();
    }

    let attachment = data::load_attachment(Path::new(data_path), None)?;
    let image = editor::EditorImage::from_upload(
        attachment.name.clone().unwrap_or_else(|| "image".to_string()),
        attachment.bytes.clone(),
    )?;
    let input = ImageInput {
        id: image.id.clone(),
        attachment,
        width: Some(image.width),
        height: Some(image.height),
    };

    let provider = provider_for(config.model.as_deref(), config.key.as_deref())?;
    let ocr: Arc<dyn ocr::OcrProvider> = Arc::new(ocr::GoogleVision::from_env()?);
    let analyzer = Analyzer::new(provider, ocr, analysis_config)
        .with_storage(services::storage_from_settings(&settings))
        .with_inpainter(services::inpainter_from_settings(&settings));
    let result = analyzer.analyze_image(&input).await?;

    if let Some(path) = config.mask_out.as_deref() {
        let mask = data::decode_base64(&result.mask_image)?;
        std::fs::write(path, mask).with_context(|| format!("failed to write mask: {}", path))?;
        info!("mask written to {}", path);
    }

    let envelope = server::AnalyzeEnvelope::success(vec![result]);
    if let Some(path) = config.export_out.as_deref() {
        let defaults = editor::ItemDefaults::from_settings(&settings);
        export_preview(image, &envelope, &defaults, Path::new(path)).await?;
    }

    serde_json::to_string_pretty(&envelope).with_context(|| "failed to serialize analysis")
}

pub async fn serve(settings_path: Option<String>, addr: Option<String>) -> Result<()> {
    let settings = settings::load_settings(settings_path.as_deref().map(Path::new))?;
    let addr = addr
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.server_addr.clone());
    server::run_server(settings, addr).await
}

/// Runs the analysis result through the editor and writes the flattened
/// canvas. A directory target gets the default `{stem}-translated.png` name.
pub async fn export_preview(
    image: editor::EditorImage,
    envelope: &server::AnalyzeEnvelope,
    defaults: &editor::ItemDefaults,
    target: &Path,
) -> Result<PathBuf> {
    let file_name = editor::export_file_name(&image.name);
    let mut store = editor::EditorStore::new();
    store.set_images(vec![image]);
    editor::ingest_analysis(&mut store, envelope, defaults)?;

    let mut canvas = editor::CanvasController::new();
    if !canvas.load_active(&store).await? {
        return Err(anyhow!("failed to load image onto the canvas"));
    }
    let path = if target.is_dir() {
        target.join(file_name)
    } else {
        target.to_path_buf()
    };
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") => {
            data::JPEG_MIME
        }
        _ => data::PNG_MIME,
    };
    let bytes = canvas.export(mime)?;
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write preview: {}", path.display()))?;
    info!("preview written to {}", path.display());
    Ok(path)
}
