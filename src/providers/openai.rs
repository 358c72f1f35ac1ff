use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::retry::{format_error_parts, send_with_retry};
use super::{Message, MessagePart, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "gpt-5-mini";

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    messages: Vec<Message>,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }
}

impl Provider for OpenAI {
    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn append_user_data(mut self, data: crate::data::DataAttachment) -> Self {
        self.messages.push(Message::user_data(data));
        self
    }

    fn call_json(self) -> ProviderFuture {
        Box::pin(async move {
            let client = reqwest::Client::new();
            let url = format!("{}/chat/completions", base_url());
            let body = request_body(&self.model, &self.messages)?;
            let text = send_with_retry(
                "OpenAI",
                || client.post(&url).bearer_auth(&self.key).json(&body),
                extract_openai_error,
            )
            .await?;
            extract_json_response(&text, &self.model)
        })
    }
}

fn base_url() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn request_body(model: &str, messages: &[Message]) -> Result<Value> {
    let messages = messages
        .iter()
        .map(|message| match message.role {
            MessageRole::System => {
                let content = message
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        MessagePart::Text(text) => Some(text.as_str()),
                        MessagePart::Data(_) => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(json!({"role": "system", "content": content}))
            }
            MessageRole::User => {
                let content = message
                    .parts
                    .iter()
                    .map(|part| match part {
                        MessagePart::Text(text) => Ok(json!({"type": "text", "text": text})),
                        MessagePart::Data(data) if data.mime.starts_with("image/") => Ok(json!({
                            "type": "image_url",
                            "image_url": {"url": data.data_url()}
                        })),
                        MessagePart::Data(data) => Err(anyhow!(
                            "OpenAI chat completions only accept images (got {})",
                            data.mime
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!({"role": "user", "content": content}))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut body = json!({
        "model": model,
        "messages": messages,
        "response_format": {"type": "json_object"}
    });
    if model.starts_with("gpt-5") {
        body["reasoning_effort"] = json!("minimal");
    }
    Ok(body)
}

fn extract_json_response(text: &str, fallback_model: &str) -> Result<ProviderResponse> {
    let payload: OpenAIResponse =
        serde_json::from_str(text).with_context(|| "failed to parse OpenAI response JSON")?;
    let choice = payload
        .choices
        .first()
        .ok_or_else(|| anyhow!("no choice returned from OpenAI"))?;
    let content = choice
        .message
        .content
        .clone()
        .unwrap_or_else(|| "{}".to_string());
    let model = payload
        .model
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    });
    Ok(ProviderResponse {
        text: content,
        model,
        usage,
    })
}

fn extract_openai_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAIError>,
    }

    #[derive(Deserialize)]
    struct OpenAIError {
        message: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        code: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(error.message, error.kind, error.code))
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataAttachment;
    use insta::assert_json_snapshot;

    #[test]
    fn openai_extract_json_content_snapshot() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/openai_chat_response.json"
        ));
        let response = extract_json_response(payload, "gpt-5-mini").unwrap();
        assert_json_snapshot!(response, @r###"
        {
          "text": "{\"boxes\":[{\"id\":\"img1-0\",\"translated\":\"안녕\",\"color\":\"#111111\"}]}",
          "model": "gpt-5-mini-2025-08-07",
          "usage": {
            "prompt_tokens": 812,
            "completion_tokens": 31,
            "total_tokens": 843
          }
        }
        "###);
    }

    #[test]
    fn null_content_becomes_empty_object() {
        let payload = r#"{"choices":[{"message":{"content":null}}]}"#;
        let response = extract_json_response(payload, "gpt-5-mini").unwrap();
        assert_eq!(response.text, "{}");
        assert_eq!(response.model.as_deref(), Some("gpt-5-mini"));
    }

    #[test]
    fn request_uses_json_mode_and_image_parts() {
        let messages = vec![
            Message::system("translate".to_string()),
            Message::user("boxes".to_string()),
            Message::user_data(DataAttachment::new(vec![1, 2, 3], "image/png", None)),
        ];
        let body = request_body("gpt-5-mini", &messages).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["reasoning_effort"], "minimal");
        assert_eq!(body["messages"][0]["content"], "translate");
        assert_eq!(
            body["messages"][2]["content"][0]["image_url"]["url"],
            "data:image/png;base64,AQID"
        );

        let body = request_body("gpt-4o", &messages).unwrap();
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn non_image_attachments_are_rejected() {
        let messages = vec![Message::user_data(DataAttachment::new(
            b"%PDF".to_vec(),
            "application/pdf",
            None,
        ))];
        assert!(request_body("gpt-5-mini", &messages).is_err());
    }

    #[test]
    fn error_body_is_summarized() {
        let body = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            extract_openai_error(body).unwrap(),
            "Incorrect API key | type: invalid_request_error | code: invalid_api_key"
        );
    }
}
