use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::de::DeserializeOwned;

use crate::cli::{LlmEngine, ModelArgs};
use crate::command::CommandClient;
use crate::env;
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;

pub const GEMINI_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];
pub const OPENAI_KEY_VARS: [&str; 1] = ["OPENAI_API_KEY"];

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5-mini";

#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    fn describe(&self) -> String;

    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn connect(args: &ModelArgs) -> anyhow::Result<Arc<dyn ModelClient>> {
    let timeout = Duration::from_secs(args.timeout_secs.max(1));

    let client: Arc<dyn ModelClient> = match args.engine {
        LlmEngine::Gemini => {
            let api_key = env::first_var(&GEMINI_KEY_VARS).ok_or_else(|| {
                anyhow::anyhow!(
                    "no Gemini API key found: set GEMINI_API_KEY or GOOGLE_API_KEY (environment or .env)"
                )
            })?;
            let base_url = args
                .base_url
                .clone()
                .or_else(|| env::first_var(&["BOOKINDEX_GEMINI_BASE_URL"]))
                .unwrap_or_else(|| crate::gemini::DEFAULT_BASE_URL.to_owned());
            let model = args
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_owned());
            Arc::new(GeminiClient::new(
                http_client(timeout)?,
                &base_url,
                api_key,
                model,
                args.temperature,
            ))
        }
        LlmEngine::Openai => {
            let api_key = env::first_var(&OPENAI_KEY_VARS).ok_or_else(|| {
                anyhow::anyhow!("no OpenAI API key found: set OPENAI_API_KEY (environment or .env)")
            })?;
            let base_url = args
                .base_url
                .clone()
                .or_else(|| env::first_var(&["BOOKINDEX_OPENAI_BASE_URL"]))
                .unwrap_or_else(|| crate::openai::DEFAULT_BASE_URL.to_owned());
            let model = args
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned());
            Arc::new(OpenAiClient::new(
                http_client(timeout)?,
                &base_url,
                api_key,
                model,
                args.temperature,
            ))
        }
        LlmEngine::Command => {
            let Some(program) = args.command.clone() else {
                anyhow::bail!("missing --command (required when --engine=command)");
            };
            Arc::new(CommandClient::new(program, args.command_args.clone()))
        }
    };

    tracing::info!(model = %client.describe(), "model client ready");
    Ok(client)
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("build http client")
}

pub fn strip_code_fence(reply: &str) -> &str {
    let text = reply.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let rest = rest.strip_suffix('\n').unwrap_or(rest);
    rest.trim()
}

pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> anyhow::Result<T> {
    let json = strip_code_fence(reply);
    if json.is_empty() {
        anyhow::bail!("model reply is empty");
    }
    serde_json::from_str(json).with_context(|| {
        let sample = json.chars().take(120).collect::<String>();
        format!("model reply is not the expected JSON (starts with {sample:?})")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{ClassificationTag, ExtractionResponse};

    #[test]
    fn strip_code_fence_handles_plain_and_json_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn parse_json_reply_reads_fenced_extraction() -> anyhow::Result<()> {
        let reply = "```json\n{\"subjects\":[{\"subject\":\"Optics\",\"subtopics\":[\"lenses\"]}]}\n```";
        let parsed: ExtractionResponse = parse_json_reply(reply)?;
        assert_eq!(parsed.subjects.len(), 1);
        assert_eq!(parsed.subjects[0].subject, "Optics");
        Ok(())
    }

    #[test]
    fn parse_json_reply_accepts_null_subtopics() -> anyhow::Result<()> {
        let reply = r#"[{"subject":"Optics","subtopic":null},{"subject":"Optics","subtopic":"lenses"}]"#;
        let tags: Vec<ClassificationTag> = parse_json_reply(reply)?;
        assert_eq!(tags[0].subtopic, None);
        assert_eq!(tags[1].subtopic.as_deref(), Some("lenses"));
        Ok(())
    }

    #[test]
    fn parse_json_reply_rejects_prose() {
        let err = parse_json_reply::<ExtractionResponse>("Sorry, I cannot help with that.")
            .err()
            .map(|e| format!("{e:#}"))
            .unwrap_or_default();
        assert!(err.contains("not the expected JSON"), "{err}");
    }
}
