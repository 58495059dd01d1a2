use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::openai::{MAX_TOKENS, TEMPERATURE};
use super::prompt::render_inline_prompt;
use super::response::Completion;
use super::retry::send_with_retry;
use super::{Translate, TranslateFuture};
use crate::settings::DEFAULT_CUSTOM_MODEL;

/// Self-hosted endpoint taking `{model, prompt}` and answering with the text
/// in `response`, `text` or `output`. Token usage is not reported.
#[derive(Debug, Clone)]
pub struct Custom {
    key: String,
    url: String,
    model: String,
    client: reqwest::Client,
}

impl Custom {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            model: DEFAULT_CUSTOM_MODEL.to_string(),
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
}

impl Translate for Custom {
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
                "prompt": prompt,
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS
            });
            let text = send_with_retry("Custom", || {
                self.client
                    .post(&self.url)
                    .bearer_auth(&self.key)
                    .json(&body)
            })
            .await?;
            let completion = extract_output(&text)?;
            Ok(completion.into_batch(texts.len()))
        })
    }
}

fn extract_output(text: &str) -> Result<Completion> {
    let payload: CustomResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse custom API response JSON: {}", err))?;
    let reply = [payload.response, payload.text, payload.output]
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Invalid response format from custom API"))?;
    Ok(Completion {
        text: reply.trim().to_string(),
        tokens: 0,
    })
}

#[derive(Debug, Deserialize)]
struct CustomResponse {
    response: Option<String>,
    text: Option<String>,
    output: Option<String>,
}
