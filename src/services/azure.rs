use super::openai::{chat_body, extract_chat_completion};
use super::retry::send_with_retry;
use super::{Translate, TranslateFuture};
use crate::settings::DEFAULT_AZURE_API_VERSION;

/// Azure OpenAI deployment. The model is fixed by the deployment.
#[derive(Debug, Clone)]
pub struct Azure {
    key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    client: reqwest::Client,
}

impl Azure {
    pub fn new(
        key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        let api_version = api_version.into();
        if !api_version.trim().is_empty() {
            self.api_version = api_version;
        }
        self
    }

    pub fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

impl Translate for Azure {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let body = chat_body(texts, target_language, context)?;
            let url = self.url();
            let text = send_with_retry("Azure", || {
                self.client
                    .post(&url)
                    .header("api-key", &self.key)
                    .json(&body)
            })
            .await?;
            let completion = extract_chat_completion(&text, "Azure")?;
            Ok(completion.into_batch(texts.len()))
        })
    }
}
