use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::editor::DEFAULT_ITEM_PADDING;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub y_tolerance: f32,
    pub min_box_size: f32,
    pub script: String,
    pub target_language: String,
    pub default_color: String,
    pub font_scale: f32,
    pub mask_padding: f32,
    pub mask_inverted: bool,
    pub mask_format: String,
    pub item_blur: f32,
    pub item_padding: f32,
    pub item_color: String,
    pub storage_endpoint: Option<String>,
    pub storage_public_host: Option<String>,
    pub storage_local_dir: Option<String>,
    pub inpaint_endpoint: Option<String>,
    pub server_addr: String,
    pub server_body_limit_mb: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            y_tolerance: 8.0,
            min_box_size: 12.0,
            script: "cjk".to_string(),
            target_language: "Korean".to_string(),
            default_color: "#333333".to_string(),
            font_scale: 0.8,
            mask_padding: 4.0,
            mask_inverted: false,
            mask_format: "image/png".to_string(),
            item_blur: 16.0,
            item_padding: DEFAULT_ITEM_PADDING,
            item_color: "#111111".to_string(),
            storage_endpoint: None,
            storage_public_host: None,
            storage_local_dir: None,
            inpaint_endpoint: None,
            server_addr: "127.0.0.1:8787".to_string(),
            server_body_limit_mb: 32,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    analysis: Option<AnalysisSettings>,
    mask: Option<MaskSettings>,
    editor: Option<EditorSettings>,
    storage: Option<StorageSettings>,
    inpaint: Option<InpaintSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisSettings {
    y_tolerance: Option<f32>,
    min_box_size: Option<f32>,
    script: Option<String>,
    target_language: Option<String>,
    default_color: Option<String>,
    font_scale: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct MaskSettings {
    padding: Option<f32>,
    inverted: Option<bool>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EditorSettings {
    blur: Option<f32>,
    padding: Option<f32>,
    text_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSettings {
    endpoint: Option<String>,
    public_host: Option<String>,
    local_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintSettings {
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    body_limit_mb: Option<usize>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    load_settings_from(home_dir().as_deref(), extra_path)
}

pub fn load_settings_from(home: Option<&Path>, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<embedded>"))?);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];

    if let Some(home) = home {
        ensure_home_settings_file(home)?;
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(analysis) = incoming.analysis {
            if let Some(tolerance) = analysis.y_tolerance
                && tolerance > 0.0
            {
                self.y_tolerance = tolerance;
            }
            if let Some(size) = analysis.min_box_size
                && size >= 0.0
            {
                self.min_box_size = size;
            }
            merge_text(&mut self.script, analysis.script);
            merge_text(&mut self.target_language, analysis.target_language);
            merge_text(&mut self.default_color, analysis.default_color);
            if let Some(scale) = analysis.font_scale
                && scale > 0.0
            {
                self.font_scale = scale;
            }
        }
        if let Some(mask) = incoming.mask {
            if let Some(padding) = mask.padding
                && padding >= 0.0
            {
                self.mask_padding = padding;
            }
            if let Some(inverted) = mask.inverted {
                self.mask_inverted = inverted;
            }
            merge_text(&mut self.mask_format, mask.format);
        }
        if let Some(editor) = incoming.editor {
            if let Some(blur) = editor.blur
                && blur >= 0.0
            {
                self.item_blur = blur;
            }
            if let Some(padding) = editor.padding
                && padding >= 0.0
            {
                self.item_padding = padding;
            }
            merge_text(&mut self.item_color, editor.text_color);
        }
        if let Some(storage) = incoming.storage {
            merge_optional(&mut self.storage_endpoint, storage.endpoint);
            merge_optional(&mut self.storage_public_host, storage.public_host);
            merge_optional(&mut self.storage_local_dir, storage.local_dir);
        }
        if let Some(inpaint) = incoming.inpaint {
            merge_optional(&mut self.inpaint_endpoint, inpaint.endpoint);
        }
        if let Some(server) = incoming.server {
            merge_text(&mut self.server_addr, server.addr);
            if let Some(limit) = server.body_limit_mb
                && limit > 0
            {
                self.server_body_limit_mb = limit;
            }
        }
    }
}

fn merge_text(target: &mut String, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = value.trim().to_string();
    }
}

fn merge_optional(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = Some(value.trim().to_string());
    }
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".llm-image-translator-rust"))
        }
    })
}
