use anyhow::Result;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{DataAttachment, PNG_MIME, data_url};
use crate::error::{AnalyzeError, AnalyzeResult};
use crate::ocr::{
    MaskColors, MaskRequest, MaskShape, MergeConfig, OcrProvider, ScriptFilter, build_mask,
    extract_regions,
};
use crate::providers::Provider;
use crate::services::{Inpainter, ObjectStorage, dated_key_parts};
use crate::settings::Settings;
use crate::translations::{
    AnalyzedTextBox, CandidateOptions, TranslationCandidate, build_candidates, fuse,
    parse_model_json, render_analyze_prompt,
};

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub merge: MergeConfig,
    pub script: ScriptFilter,
    pub candidates: CandidateOptions,
    pub target_language: String,
    pub mask_padding: f32,
    pub mask_colors: MaskColors,
}

impl AnalysisConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let colors = MaskColors::default();
        Ok(Self {
            merge: MergeConfig {
                y_tolerance: settings.y_tolerance,
                min_box_size: settings.min_box_size,
            },
            script: ScriptFilter::from_name(&settings.script)?,
            candidates: CandidateOptions {
                default_color: settings.default_color.clone(),
                font_scale: settings.font_scale,
            },
            target_language: settings.target_language.clone(),
            mask_padding: settings.mask_padding,
            mask_colors: if settings.mask_inverted {
                colors.inverted()
            } else {
                colors
            },
        })
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            merge: MergeConfig::default(),
            script: ScriptFilter::default(),
            candidates: CandidateOptions::default(),
            target_language: "Korean".to_string(),
            mask_padding: 4.0,
            mask_colors: MaskColors::default(),
        }
    }
}

/// One uploaded image. Dimensions reported by the client win over the OCR page
/// size, which wins over decoding the bytes.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub id: String,
    pub attachment: DataAttachment,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub image_id: String,
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<AnalyzedTextBox>,
    pub mask_image: String,
    pub inpainted_image: Option<String>,
}

pub struct Analyzer<P: Provider> {
    provider: P,
    ocr: Arc<dyn OcrProvider>,
    storage: Option<Arc<dyn ObjectStorage>>,
    inpainter: Option<Arc<dyn Inpainter>>,
    config: AnalysisConfig,
}

impl<P: Provider> Analyzer<P> {
    pub fn new(provider: P, ocr: Arc<dyn OcrProvider>, config: AnalysisConfig) -> Self {
        Self {
            provider,
            ocr,
            storage: None,
            inpainter: None,
            config,
        }
    }

    pub fn with_storage(mut self, storage: Option<Arc<dyn ObjectStorage>>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_inpainter(mut self, inpainter: Option<Arc<dyn Inpainter>>) -> Self {
        self.inpainter = inpainter;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Images run one after another; the first failure aborts the batch and no
    /// partial results are returned.
    pub async fn analyze_batch(&self, inputs: &[ImageInput]) -> AnalyzeResult<Vec<ImageAnalysis>> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.analyze_image(input).await?);
        }
        Ok(results)
    }

    pub async fn analyze_image(&self, input: &ImageInput) -> AnalyzeResult<ImageAnalysis> {
        let page = self
            .ocr
            .detect(&input.attachment)
            .await
            .map_err(AnalyzeError::provider)?;
        let (width, height) = match (input.width.or(page.width), input.height.or(page.height)) {
            (Some(width), Some(height)) => (width, height),
            _ => decoded_dimensions(&input.attachment.bytes)?,
        };

        let regions = extract_regions(&page, &self.config.merge, &self.config.script);
        let candidates = build_candidates(&input.id, &regions, &self.config.candidates);
        info!(
            "analyze {}: {}x{}, {} candidates via {}",
            input.id,
            width,
            height,
            candidates.len(),
            self.ocr.name()
        );

        let shapes = candidates
            .iter()
            .map(|candidate| MaskShape::Rect(candidate.bbox))
            .collect::<Vec<_>>();
        let mask_request = MaskRequest::new(width, height, shapes)
            .with_padding(self.config.mask_padding)
            .with_colors(self.config.mask_colors.clone());
        let mask = build_mask(&mask_request, PNG_MIME).map_err(AnalyzeError::render)?;

        let boxes = self.translate(candidates, &input.attachment).await?;
        let inpainted_image = self.inpaint(&input.attachment, &mask).await?;

        Ok(ImageAnalysis {
            image_id: input.id.clone(),
            width,
            height,
            boxes,
            mask_image: data_url(PNG_MIME, &mask),
            inpainted_image,
        })
    }

    /// One model call per image. With no candidates there is nothing to ask, so
    /// the call is skipped.
    pub async fn translate(
        &self,
        candidates: Vec<TranslationCandidate>,
        image: &DataAttachment,
    ) -> AnalyzeResult<Vec<AnalyzedTextBox>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = render_analyze_prompt(&candidates, &self.config.target_language)
            .map_err(AnalyzeError::provider)?;
        let response = self
            .provider
            .clone()
            .append_user_input(prompt)
            .append_user_data(image.clone())
            .call_json()
            .await
            .map_err(AnalyzeError::provider)?;
        debug!(
            "model {} replied with {} chars",
            response.model.as_deref().unwrap_or("unknown"),
            response.text.len()
        );
        let parsed: Value = parse_model_json(&response.text)?;
        Ok(fuse(candidates, &parsed))
    }

    async fn inpaint(&self, image: &DataAttachment, mask: &[u8]) -> AnalyzeResult<Option<String>> {
        let (Some(storage), Some(inpainter)) = (&self.storage, &self.inpainter) else {
            return Ok(None);
        };
        let source_key = dated_key_parts("source", &image.bytes).map_err(AnalyzeError::provider)?;
        let image_url = storage
            .put(&image.bytes, &image.mime, &source_key)
            .await
            .map_err(AnalyzeError::provider)?;
        let mask_key = dated_key_parts("mask", mask).map_err(AnalyzeError::provider)?;
        let mask_url = storage
            .put(mask, PNG_MIME, &mask_key)
            .await
            .map_err(AnalyzeError::provider)?;
        let url = inpainter
            .inpaint(&image_url, &mask_url)
            .await
            .map_err(AnalyzeError::provider)?;
        if url.trim().is_empty() {
            warn!("inpainter returned an empty url");
            return Ok(None);
        }
        Ok(Some(url))
    }
}

fn decoded_dimensions(bytes: &[u8]) -> AnalyzeResult<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?;
    Ok(reader.into_dimensions()?)
}
