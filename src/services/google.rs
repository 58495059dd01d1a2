use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::openai::{MAX_TOKENS, TEMPERATURE};
use super::prompt::render_inline_prompt;
use super::response::Completion;
use super::retry::send_with_retry;
use super::{Translate, TranslateFuture};
use crate::settings::DEFAULT_GOOGLE_MODEL;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct Google {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Google {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_GOOGLE_MODEL.to_string(),
            base_url: BASE_URL.to_string(),
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

impl Translate for Google {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let prompt = render_inline_prompt(texts, target_language, context)?;
            let body = json!({
                "contents": [{"parts": [{"text": prompt}]}],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "maxOutputTokens": MAX_TOKENS
                }
            });
            let url = format!("{}/{}:generateContent", self.base_url, self.model);
            let text = send_with_retry("Google", || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.key)
                    .json(&body)
            })
            .await?;
            let completion = extract_candidate(&text)?;
            Ok(completion.into_batch(texts.len()))
        })
    }
}

fn extract_candidate(text: &str) -> Result<Completion> {
    let payload: GenerateResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Google response JSON: {}", err))?;
    let reply = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or_else(|| anyhow!("no candidate returned from Google"))?;
    let tokens = payload
        .usage_metadata
        .and_then(|usage| usage.total_token_count.or(usage.total_tokens))
        .unwrap_or(0);
    Ok(Completion {
        text: reply.trim().to_string(),
        tokens,
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
    #[serde(rename = "totalTokens")]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_and_total_token_count() {
        let payload = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "1. Hallo\n2. Welt"}]}}],
            "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 4, "totalTokenCount": 34}
        }"#;
        let completion = extract_candidate(payload).unwrap();
        assert_eq!(completion.tokens, 34);
        assert_eq!(completion.into_batch(2).translations, vec!["Hallo", "Welt"]);
    }

    #[test]
    fn older_total_tokens_field_is_accepted() {
        let payload = r#"{
            "candidates": [{"content": {"parts": [{"text": "Hallo"}]}}],
            "usageMetadata": {"totalTokens": 12}
        }"#;
        assert_eq!(extract_candidate(payload).unwrap().tokens, 12);
    }

    #[test]
    fn blocked_prompt_without_candidates_fails() {
        let payload = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(extract_candidate(payload).is_err());
    }
}
