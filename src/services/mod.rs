//! Translation backends. Each one turns a batch of texts into the same number
//! of translations plus the token count reported by the service.

use anyhow::{Result, anyhow};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use crate::error::{PageError, PageResult};
use crate::settings::Settings;

mod anthropic;
mod azure;
pub mod cache;
mod custom;
mod google;
pub mod languages;
mod openai;
pub mod prompt;
pub mod response;
mod retry;

pub use anthropic::Anthropic;
pub use azure::Azure;
pub use cache::CachedTranslator;
pub use custom::Custom;
pub use google::Google;
pub use openai::OpenAI;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchTranslation {
    pub translations: Vec<String>,
    pub tokens: u64,
}

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<BatchTranslation>> + Send + 'a>>;

/// The external collaborator asked for every batch.
pub trait Translate {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a>;
}

impl<T: Translate + ?Sized> Translate for &T {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        (**self).translate(texts, target_language, context)
    }
}

impl<T: Translate + ?Sized> Translate for Box<T> {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        (**self).translate(texts, target_language, context)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    OpenAI,
    Azure,
    Anthropic,
    Google,
    Custom,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::OpenAI,
        ServiceKind::Azure,
        ServiceKind::Anthropic,
        ServiceKind::Google,
        ServiceKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::OpenAI => "openai",
            ServiceKind::Azure => "azure",
            ServiceKind::Anthropic => "anthropic",
            ServiceKind::Google => "google",
            ServiceKind::Custom => "custom",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ServiceKind::OpenAI => "OpenAI",
            ServiceKind::Azure => "Azure OpenAI",
            ServiceKind::Anthropic => "Anthropic",
            ServiceKind::Google => "Google",
            ServiceKind::Custom => "custom API",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "unknown translation service '{}' (expected openai, azure, anthropic, google or custom)",
                    value.trim()
                )
            })
    }
}

#[derive(Debug, Clone)]
pub enum ServiceImpl {
    OpenAI(OpenAI),
    Azure(Azure),
    Anthropic(Anthropic),
    Google(Google),
    Custom(Custom),
}

impl ServiceImpl {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceImpl::OpenAI(_) => ServiceKind::OpenAI,
            ServiceImpl::Azure(_) => ServiceKind::Azure,
            ServiceImpl::Anthropic(_) => ServiceKind::Anthropic,
            ServiceImpl::Google(_) => ServiceKind::Google,
            ServiceImpl::Custom(_) => ServiceKind::Custom,
        }
    }
}

impl Translate for ServiceImpl {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        match self {
            ServiceImpl::OpenAI(service) => service.translate(texts, target_language, context),
            ServiceImpl::Azure(service) => service.translate(texts, target_language, context),
            ServiceImpl::Anthropic(service) => service.translate(texts, target_language, context),
            ServiceImpl::Google(service) => service.translate(texts, target_language, context),
            ServiceImpl::Custom(service) => service.translate(texts, target_language, context),
        }
    }
}

/// Builds the backend selected by `kind` from settings. Missing credentials
/// are reported before any request is made.
pub fn build_service(settings: &Settings, kind: ServiceKind) -> PageResult<ServiceImpl> {
    let key = settings
        .api_key(kind)
        .ok_or_else(|| PageError::configuration(format!("{} API key not configured", kind.label())))?;

    let service = match kind {
        ServiceKind::OpenAI => {
            let mut service = OpenAI::new(key).with_model(settings.openai.model.clone());
            if let Some(base_url) = settings.openai.base_url.clone() {
                service = service.with_base_url(base_url);
            }
            ServiceImpl::OpenAI(service)
        }
        ServiceKind::Azure => {
            let azure = &settings.azure;
            let (Some(endpoint), Some(deployment)) = (azure.endpoint.clone(), azure.deployment.clone())
            else {
                return Err(PageError::configuration(
                    "Azure endpoint or deployment not configured",
                ));
            };
            let mut service = Azure::new(key, endpoint, deployment);
            if let Some(api_version) = azure.api_version.clone() {
                service = service.with_api_version(api_version);
            }
            ServiceImpl::Azure(service)
        }
        ServiceKind::Anthropic => {
            let mut service = Anthropic::new(key).with_model(settings.anthropic.model.clone());
            if let Some(base_url) = settings.anthropic.base_url.clone() {
                service = service.with_base_url(base_url);
            }
            ServiceImpl::Anthropic(service)
        }
        ServiceKind::Google => {
            let mut service = Google::new(key).with_model(settings.google.model.clone());
            if let Some(base_url) = settings.google.base_url.clone() {
                service = service.with_base_url(base_url);
            }
            ServiceImpl::Google(service)
        }
        ServiceKind::Custom => {
            let Some(url) = settings.custom.url.clone() else {
                return Err(PageError::configuration("Custom API URL not configured"));
            };
            ServiceImpl::Custom(Custom::new(key, url).with_model(settings.custom.model.clone()))
        }
    };
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_round_trips_names() {
        for kind in ServiceKind::ALL {
            assert_eq!(kind.as_str().parse::<ServiceKind>().unwrap(), kind);
        }
        assert_eq!(" OpenAI ".parse::<ServiceKind>().unwrap(), ServiceKind::OpenAI);
        assert!("deepl".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn build_service_requires_key() {
        let settings = Settings::default();
        let err = build_service(&settings, ServiceKind::Google).unwrap_err();
        assert!(matches!(err, PageError::Configuration(_)));
        assert!(err.to_string().contains("Google API key not configured"));
    }

    #[test]
    fn build_service_checks_azure_and_custom_targets() {
        let mut settings = Settings::default();
        settings.azure.api_key = Some("az-key".to_string());
        settings.custom.api_key = Some("custom-key".to_string());

        let err = build_service(&settings, ServiceKind::Azure).unwrap_err();
        assert!(err.to_string().contains("Azure endpoint or deployment"));
        let err = build_service(&settings, ServiceKind::Custom).unwrap_err();
        assert!(err.to_string().contains("Custom API URL"));

        settings.azure.endpoint = Some("https://example.openai.azure.com/".to_string());
        settings.azure.deployment = Some("gpt4".to_string());
        let service = build_service(&settings, ServiceKind::Azure).unwrap();
        assert_eq!(service.kind(), ServiceKind::Azure);
    }
}
