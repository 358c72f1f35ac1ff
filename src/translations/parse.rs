use serde_json::Value;

use crate::error::{AnalyzeError, AnalyzeResult};

/// Parses a JSON-mode model reply. Replies wrapped in prose or code fences are
/// salvaged by re-parsing the first balanced `{...}` object.
pub fn parse_model_json(text: &str) -> AnalyzeResult<Value> {
    let strict_err = match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let Some(candidate) = first_balanced_object(text) else {
        return Err(AnalyzeError::ModelResponseParse(format!(
            "no JSON object in model response ({})",
            strict_err
        )));
    };
    serde_json::from_str::<Value>(candidate).map_err(|err| {
        AnalyzeError::ModelResponseParse(format!("salvaged object is not valid JSON ({})", err))
    })
}

fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
