use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::openai::{MAX_TOKENS, TEMPERATURE};
use super::prompt::render_inline_prompt;
use super::response::Completion;
use super::retry::send_with_retry;
use super::{Translate, TranslateFuture};
use crate::settings::DEFAULT_ANTHROPIC_MODEL;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct Anthropic {
    key: String,
    model: String,
    url: String,
    client: reqwest::Client,
}

impl Anthropic {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.trim().is_empty() {
            self.url = url;
        }
        self
    }
}

impl Translate for Anthropic {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let prompt = render_inline_prompt(texts, target_language, context)?;
            let body = json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "temperature": TEMPERATURE,
                "messages": [{"role": "user", "content": prompt}]
            });
            let text = send_with_retry("Anthropic", || {
                self.client
                    .post(&self.url)
                    .header("x-api-key", &self.key)
                    .header("anthropic-version", API_VERSION)
                    .json(&body)
            })
            .await?;
            let completion = extract_message(&text)?;
            Ok(completion.into_batch(texts.len()))
        })
    }
}

fn extract_message(text: &str) -> Result<Completion> {
    let payload: MessageResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Anthropic response JSON: {}", err))?;
    let reply = payload
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| anyhow!("no text block returned from Anthropic"))?;
    let tokens = payload
        .usage
        .map(|usage| usage.input_tokens.unwrap_or(0) + usage.output_tokens.unwrap_or(0))
        .unwrap_or(0);
    Ok(Completion {
        text: reply.trim().to_string(),
        tokens,
    })
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<MessageUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_tokens_add_input_and_output() {
        let payload = r#"{
            "id": "msg_01",
            "type": "message",
            "content": [{"type": "text", "text": "Bonjour\nMonde"}],
            "usage": {"input_tokens": 120, "output_tokens": 8}
        }"#;
        let completion = extract_message(payload).unwrap();
        assert_eq!(completion.tokens, 128);
        assert_eq!(completion.into_batch(2).translations, vec!["Bonjour", "Monde"]);
    }

    #[test]
    fn empty_content_is_an_error() {
        let err = extract_message(r#"{"content": []}"#).unwrap_err();
        assert!(err.to_string().contains("Anthropic"));
    }
}
