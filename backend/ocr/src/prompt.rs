//! Chat request construction and reply parsing shared by the vision and
//! bulk backends.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use nameplate_config::ApiConfig;
use nameplate_core::{ImageInput, RawFields};

/// Instruction sent with every image.
pub const EXTRACTION_PROMPT: &str = "\
You are reading the identification plate of an industrial pressure vessel or boiler. \
Transcribe every labelled field you can read on the plate. \
Answer with a single flat JSON object: one key per label exactly as printed on the plate \
and the printed value as a string, units included. \
Do not translate, rename or infer fields, and do not add commentary outside the JSON.";

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap());

/// Model parameters for one chat completion.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&ApiConfig> for ChatSettings {
    fn from(api: &ApiConfig) -> Self {
        Self {
            model: api.model.clone(),
            temperature: api.temperature,
            max_tokens: api.max_tokens,
        }
    }
}

pub fn image_data_uri(image: &ImageInput) -> String {
    format!("data:{};base64,{}", image.mime_type, STANDARD.encode(&image.bytes))
}

/// Body of a `/chat/completions` request for one image.
pub fn chat_request_body(settings: &ChatSettings, image: &ImageInput) -> Value {
    json!({
        "model": settings.model,
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
        "response_format": { "type": "json_object" },
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": EXTRACTION_PROMPT },
                { "type": "image_url", "image_url": image_data_uri(image) }
            ]
        }]
    })
}

/// Text content of the first choice of a chat completion response.
pub fn completion_text(response: &Value) -> Result<&str> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .context("Chat completion has no message content")
}

/// Extract the JSON object from a model reply, tolerating code fences and
/// surrounding prose.
pub fn parse_fields(reply: &str) -> Result<RawFields> {
    let body = FENCED_BLOCK
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    let start = body.find('{');
    let end = body.rfind('}');
    let candidate = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => bail!("Model reply contains no JSON object"),
    };

    let value: Value =
        serde_json::from_str(candidate).context("Model reply is not valid JSON")?;
    match value {
        Value::Object(fields) => Ok(fields),
        other => bail!("Expected a JSON object, got {}", type_name(&other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"PMTA\": \"14,5 kgf/cm²\", \"Category\": \"I\"}\n```";
        let fields = parse_fields(reply).unwrap();
        assert_eq!(fields["PMTA"], "14,5 kgf/cm²");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn parses_bare_object_with_prose() {
        let fields = parse_fields("Result: {\"Tag\": \"V-101\"} (done)").unwrap();
        assert_eq!(fields["Tag"], "V-101");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(parse_fields("no json here").is_err());
        assert!(parse_fields("```json\n[1, 2]\n```").is_err());
        assert!(parse_fields("{ broken").is_err());
    }

    #[test]
    fn request_embeds_data_uri() {
        let settings = ChatSettings::from(&ApiConfig::default());
        let image = ImageInput::new("plate.png", "image/png", vec![1, 2, 3]);
        let body = chat_request_body(&settings, &image);
        assert_eq!(body["model"], "pixtral-12b-2409");
        assert_eq!(
            body["messages"][0]["content"][1]["image_url"],
            "data:image/png;base64,AQID"
        );
    }

    #[test]
    fn completion_text_reads_first_choice() {
        let response = json!({"choices": [{"message": {"content": "{}"}}]});
        assert_eq!(completion_text(&response).unwrap(), "{}");
        assert!(completion_text(&json!({"choices": []})).is_err());
    }
}
