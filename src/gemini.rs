use anyhow::Context as _;

use crate::model::ModelClient;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: String,
        model: String,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            client,
            endpoint: generate_content_endpoint(base_url, &model),
            api_key,
            model,
            temperature,
        }
    }
}

#[async_trait::async_trait]
impl ModelClient for GeminiClient {
    fn describe(&self) -> String {
        format!("gemini:{}", self.model)
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let mut body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
        });
        if let Some(temperature) = self.temperature
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert(
                "generationConfig".to_owned(),
                serde_json::json!({ "temperature": temperature }),
            );
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read Gemini response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("Gemini API error ({status}): {message}");
        }

        let value: serde_json::Value = serde_json::from_str(&raw).context("parse Gemini response")?;
        extract_candidate_text(&value).context("extract candidate text")
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_candidate_text(value: &serde_json::Value) -> anyhow::Result<String> {
    if let Some(reason) = value
        .pointer("/promptFeedback/blockReason")
        .and_then(|v| v.as_str())
    {
        anyhow::bail!("prompt blocked by Gemini ({reason})");
    }

    let candidate = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|v| v.first())
        .ok_or_else(|| anyhow::anyhow!("missing `candidates` in response"))?;

    let mut text = String::new();
    if let Some(parts) = candidate.pointer("/content/parts").and_then(|v| v.as_array()) {
        for part in parts {
            // Thought summaries are not part of the answer.
            if part.get("thought").and_then(|v| v.as_bool()) == Some(true) {
                continue;
            }
            if let Some(part_text) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(part_text);
            }
        }
    }

    if text.trim().is_empty() {
        let finish = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        anyhow::bail!("Gemini candidate text is empty (finishReason={finish})");
    }
    Ok(text)
}
