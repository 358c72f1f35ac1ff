use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{AnalyzedTextBox, TranslationCandidate};
use crate::error::{AnalyzeError, AnalyzeResult};

/// One entry of the model's `boxes` array. Every field is optional because the
/// model output is untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBox {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub translated: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidBox {
    pub id: String,
    pub translated: Option<String>,
    pub color: Option<String>,
}

impl ResponseBox {
    pub fn validate(self) -> AnalyzeResult<ValidBox> {
        let id = self
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AnalyzeError::Validation("response box has no id".to_string()))?;
        Ok(ValidBox {
            id,
            translated: non_empty(self.translated),
            color: non_empty(self.color).map(|color| color.trim().to_string()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Indexes valid response entries by id. A missing or non-array `boxes` means
/// no matches; the first entry wins when an id repeats.
pub fn collect_matches(response: &Value) -> HashMap<String, ValidBox> {
    let mut matches = HashMap::new();
    let Some(entries) = response.get("boxes").and_then(Value::as_array) else {
        return matches;
    };
    for entry in entries {
        let parsed = serde_json::from_value::<ResponseBox>(entry.clone())
            .map_err(|err| AnalyzeError::Validation(err.to_string()))
            .and_then(ResponseBox::validate);
        match parsed {
            Ok(valid) => {
                matches.entry(valid.id.clone()).or_insert(valid);
            }
            Err(err) => debug!("fusion: skipping response entry: {}", err),
        }
    }
    matches
}

/// Joins model output onto candidates by id. Always yields one box per
/// candidate, in candidate order.
pub fn fuse(candidates: Vec<TranslationCandidate>, response: &Value) -> Vec<AnalyzedTextBox> {
    let matches = collect_matches(response);
    let mut matched = 0usize;
    let boxes = candidates
        .into_iter()
        .map(|candidate| {
            let found = matches.get(&candidate.id);
            if found.is_some() {
                matched += 1;
            }
            let translated = found
                .and_then(|valid| valid.translated.clone())
                .unwrap_or(candidate.translated);
            let color = found
                .and_then(|valid| valid.color.clone())
                .unwrap_or(candidate.color);
            AnalyzedTextBox {
                id: candidate.id,
                bbox: candidate.bbox,
                original: candidate.original,
                translated,
                font_size: Some(candidate.font_size),
                color: Some(color),
            }
        })
        .collect::<Vec<_>>();
    debug!("fusion: matched {}/{} candidates", matched, boxes.len());
    boxes
}
