use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::prompt::{render_prompt, system_prompt};
use super::response::Completion;
use super::retry::send_with_retry;
use super::{Translate, TranslateFuture};
use crate::settings::DEFAULT_OPENAI_MODEL;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const TEMPERATURE: f64 = 0.3;
pub(crate) const MAX_TOKENS: u32 = 4000;

#[derive(Debug, Clone)]
pub struct OpenAI {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAI {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
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

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }
}

impl Translate for OpenAI {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let mut body = chat_body(texts, target_language, context)?;
            body["model"] = json!(self.model);
            let url = format!("{}/chat/completions", self.base_url);
            let text = send_with_retry("OpenAI", || {
                self.client.post(&url).bearer_auth(&self.key).json(&body)
            })
            .await?;
            let completion = extract_chat_completion(&text, "OpenAI")?;
            Ok(completion.into_batch(texts.len()))
        })
    }
}

/// Chat completions body shared with Azure deployments, which take the model
/// from the URL instead.
pub(crate) fn chat_body(texts: &[String], target_language: &str, context: &str) -> Result<Value> {
    let prompt = render_prompt(texts, target_language, context)?;
    Ok(json!({
        "messages": [
            {"role": "system", "content": system_prompt()},
            {"role": "user", "content": prompt}
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS
    }))
}

pub(crate) fn extract_chat_completion(text: &str, service: &str) -> Result<Completion> {
    let payload: ChatResponse = serde_json::from_str(text)
        .with_context(|| format!("failed to parse {} response JSON", service))?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("no completion returned from {}", service))?;
    let tokens = payload
        .usage
        .and_then(|usage| usage.total_tokens)
        .unwrap_or(0);
    Ok(Completion {
        text: content.trim().to_string(),
        tokens,
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_uses_system_and_user_messages() {
        let texts = vec!["Hello".to_string()];
        let body = chat_body(&texts, "es", "Greeting page").unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"],
            "Context: Greeting page\n\nTranslate these texts to Español:\n\n1. Hello"
        );
        assert_eq!(body["max_tokens"], 4000);
        assert!(body.get("model").is_none());
    }

    #[test]
    fn completion_reads_content_and_total_tokens() {
        let payload = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": " 1. Hola\n2. Adiós \n"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 6, "total_tokens": 46}
        }"#;
        let completion = extract_chat_completion(payload, "OpenAI").unwrap();
        assert_eq!(completion.tokens, 46);
        let batch = completion.into_batch(2);
        assert_eq!(batch.translations, vec!["Hola", "Adiós"]);
    }

    #[test]
    fn missing_usage_counts_zero_and_missing_choice_fails() {
        let payload = r#"{"choices": [{"message": {"content": "Hola"}}]}"#;
        assert_eq!(extract_chat_completion(payload, "OpenAI").unwrap().tokens, 0);
        let err = extract_chat_completion(r#"{"choices": []}"#, "OpenAI").unwrap_err();
        assert!(err.to_string().contains("no completion returned from OpenAI"));
    }
}
