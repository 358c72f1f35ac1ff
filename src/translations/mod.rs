use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tera::{Context as TeraContext, Tera};

use crate::ocr::{MergedRegion, Rect};

mod fusion;
mod parse;

pub use fusion::{ResponseBox, ValidBox, collect_matches, fuse};
pub use parse::parse_model_json;

pub const DEFAULT_COLOR: &str = "#333333";
pub const DEFAULT_FONT_SCALE: f32 = 0.8;

/// A merged region queued for translation. `translated` and `color` start as
/// the fallbacks fusion uses when the model has nothing for this id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationCandidate {
    pub id: String,
    pub original: String,
    pub bbox: Rect,
    pub translated: String,
    pub color: String,
    pub font_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedTextBox {
    pub id: String,
    pub bbox: Rect,
    pub original: String,
    pub translated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CandidateOptions {
    pub default_color: String,
    pub font_scale: f32,
}

impl Default for CandidateOptions {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_COLOR.to_string(),
            font_scale: DEFAULT_FONT_SCALE,
        }
    }
}

/// Numbers regions in order as `{image_id}-{index}`. The ids only have to hold
/// for the current analysis pass.
pub fn build_candidates(
    image_id: &str,
    regions: &[MergedRegion],
    options: &CandidateOptions,
) -> Vec<TranslationCandidate> {
    regions
        .iter()
        .enumerate()
        .map(|(idx, region)| TranslationCandidate {
            id: format!("{}-{}", image_id, idx),
            original: region.text.clone(),
            bbox: region.rect,
            translated: region.text.clone(),
            color: options.default_color.clone(),
            font_size: (region.rect.height * options.font_scale).round(),
        })
        .collect()
}

pub fn render_analyze_prompt(
    candidates: &[TranslationCandidate],
    target_language: &str,
) -> Result<String> {
    let template = load_prompt_template("analyze_prompt.tera")?;
    let mut context = TeraContext::new();
    context.insert("candidates", candidates);
    context.insert("target_language", target_language);

    Tera::one_off(&template, &context, false).with_context(|| "failed to render analyze prompt")
}

fn load_prompt_template(name: &str) -> Result<String> {
    let path = prompt_path(name);
    fs::read_to_string(&path).with_context(|| format!("failed to read prompt: {}", path.display()))
}

fn prompt_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("translations")
        .join("prompts")
        .join(name)
}
