use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::services::ServiceKind;
use crate::session::DEFAULT_CONCURRENCY;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const DEFAULT_TARGET_LANGUAGE: &str = "es";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-pro";
pub const DEFAULT_CUSTOM_MODEL: &str = "default";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

#[derive(Debug, Clone)]
pub struct Settings {
    pub target_language: String,
    pub service: ServiceKind,
    pub parallel_requests: usize,
    pub batch_size: usize,
    pub show_original_on_hover: bool,
    pub show_translation_indicator: bool,
    pub openai: ModelService,
    pub azure: AzureService,
    pub anthropic: ModelService,
    pub google: ModelService,
    pub custom: CustomService,
}

/// Credentials for a hosted model API.
#[derive(Debug, Clone)]
pub struct ModelService {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl ModelService {
    fn with_model(model: &str) -> Self {
        Self {
            api_key: None,
            model: model.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AzureService {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CustomService {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            service: ServiceKind::OpenAI,
            parallel_requests: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            show_original_on_hover: true,
            show_translation_indicator: true,
            openai: ModelService::with_model(DEFAULT_OPENAI_MODEL),
            azure: AzureService::default(),
            anthropic: ModelService::with_model(DEFAULT_ANTHROPIC_MODEL),
            google: ModelService::with_model(DEFAULT_GOOGLE_MODEL),
            custom: CustomService {
                api_key: None,
                url: None,
                model: DEFAULT_CUSTOM_MODEL.to_string(),
            },
        }
    }
}

impl Settings {
    pub fn api_key(&self, kind: ServiceKind) -> Option<String> {
        let key = match kind {
            ServiceKind::OpenAI => self.openai.api_key.as_deref(),
            ServiceKind::Azure => self.azure.api_key.as_deref(),
            ServiceKind::Anthropic => self.anthropic.api_key.as_deref(),
            ServiceKind::Google => self.google.api_key.as_deref(),
            ServiceKind::Custom => self.custom.api_key.as_deref(),
        };
        key.map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    /// Fills missing API keys from the environment.
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup_any = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };
        fill_missing(&mut self.openai.api_key, || lookup_any(&["OPENAI_API_KEY"]));
        fill_missing(&mut self.azure.api_key, || {
            lookup_any(&["AZURE_OPENAI_API_KEY"])
        });
        fill_missing(&mut self.anthropic.api_key, || {
            lookup_any(&["ANTHROPIC_API_KEY"])
        });
        fill_missing(&mut self.google.api_key, || {
            lookup_any(&["GEMINI_API_KEY", "GOOGLE_API_KEY"])
        });
        fill_missing(&mut self.custom.api_key, || lookup_any(&["CUSTOM_API_KEY"]));
        fill_missing(&mut self.openai.base_url, || {
            lookup_any(&["OPENAI_BASE_URL"])
        });
        fill_missing(&mut self.anthropic.base_url, || {
            lookup_any(&["ANTHROPIC_BASE_URL"])
        });
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(translation) = incoming.translation {
            if let Some(lang) = non_blank(translation.target_language) {
                self.target_language = lang;
            }
            if let Some(service) = non_blank(translation.service) {
                self.service = service.parse()?;
            }
            if let Some(parallel) = translation.parallel_requests
                && parallel > 0
            {
                self.parallel_requests = parallel;
            }
            if let Some(size) = translation.batch_size
                && size > 0
            {
                self.batch_size = size;
            }
            if let Some(hover) = translation.show_original_on_hover {
                self.show_original_on_hover = hover;
            }
            if let Some(indicator) = translation.show_translation_indicator {
                self.show_translation_indicator = indicator;
            }
        }
        if let Some(openai) = incoming.openai {
            merge_model_service(&mut self.openai, openai);
        }
        if let Some(anthropic) = incoming.anthropic {
            merge_model_service(&mut self.anthropic, anthropic);
        }
        if let Some(google) = incoming.google {
            merge_model_service(&mut self.google, google);
        }
        if let Some(azure) = incoming.azure {
            replace_if_set(&mut self.azure.api_key, azure.api_key);
            replace_if_set(&mut self.azure.endpoint, azure.endpoint);
            replace_if_set(&mut self.azure.deployment, azure.deployment);
            replace_if_set(&mut self.azure.api_version, azure.api_version);
        }
        if let Some(custom) = incoming.custom {
            replace_if_set(&mut self.custom.api_key, custom.api_key);
            replace_if_set(&mut self.custom.url, custom.url);
            if let Some(model) = non_blank(custom.model) {
                self.custom.model = model;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translation: Option<TranslationSection>,
    openai: Option<ModelSection>,
    azure: Option<AzureSection>,
    anthropic: Option<ModelSection>,
    google: Option<ModelSection>,
    custom: Option<CustomSection>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSection {
    target_language: Option<String>,
    service: Option<String>,
    parallel_requests: Option<usize>,
    batch_size: Option<usize>,
    show_original_on_hover: Option<bool>,
    show_translation_indicator: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelSection {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AzureSection {
    api_key: Option<String>,
    endpoint: Option<String>,
    deployment: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomSection {
    api_key: Option<String>,
    url: Option<String>,
    model: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("page-translator.toml"),
        PathBuf::from("page-translator.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = load_layers(&ordered_paths)?;
    settings.apply_env_fallbacks(|name| std::env::var(name).ok());
    Ok(settings)
}

/// Merges the given files in order over the defaults. Missing files are
/// skipped.
pub fn load_layers(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    for path in paths {
        if !path.exists() {
            continue;
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        let parsed: SettingsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        settings
            .merge(parsed)
            .with_context(|| format!("invalid settings: {}", path.display()))?;
    }
    Ok(settings)
}

fn merge_model_service(target: &mut ModelService, incoming: ModelSection) {
    replace_if_set(&mut target.api_key, incoming.api_key);
    replace_if_set(&mut target.base_url, incoming.base_url);
    if let Some(model) = non_blank(incoming.model) {
        target.model = model;
    }
}

fn replace_if_set(target: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = non_blank(incoming) {
        *target = Some(value);
    }
}

fn fill_missing<F>(target: &mut Option<String>, fallback: F)
where
    F: FnOnce() -> Option<String>,
{
    let missing = target.as_deref().is_none_or(|value| value.trim().is_empty());
    if missing && let Some(value) = fallback() {
        *target = Some(value.trim().to_string());
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".page-translator"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn bundled_defaults_parse_to_builtin_values() {
        let parsed: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML).unwrap();
        let mut settings = Settings::default();
        settings.merge(parsed).unwrap();
        assert_eq!(settings.target_language, "es");
        assert_eq!(settings.service, ServiceKind::OpenAI);
        assert_eq!(settings.parallel_requests, 3);
        assert_eq!(settings.batch_size, 20);
        assert!(settings.show_original_on_hover);
        assert!(settings.show_translation_indicator);
        assert_eq!(settings.openai.model, DEFAULT_OPENAI_MODEL);
        assert!(settings.api_key(ServiceKind::OpenAI).is_none());
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.toml");
        let local = dir.path().join("local.toml");
        fs::write(
            &base,
            r#"
[translation]
target_language = "fr"
service = "anthropic"
parallel_requests = 5

[anthropic]
api_key = "base-key"
model = "claude-3-haiku-20240307"
"#,
        )
        .unwrap();
        fs::write(
            &local,
            r#"
[translation]
target_language = "de"
show_original_on_hover = false

[anthropic]
api_key = "  "
"#,
        )
        .unwrap();

        let settings = load_layers(&[base, dir.path().join("missing.toml"), local]).unwrap();
        assert_eq!(settings.target_language, "de");
        assert_eq!(settings.service, ServiceKind::Anthropic);
        assert_eq!(settings.parallel_requests, 5);
        assert!(!settings.show_original_on_hover);
        assert_eq!(settings.api_key(ServiceKind::Anthropic).as_deref(), Some("base-key"));
        assert_eq!(settings.anthropic.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn unknown_service_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[translation]\nservice = \"babelfish\"\n").unwrap();
        let err = load_layers(&[path]).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown translation service"));
    }

    #[test]
    fn env_fills_only_missing_keys() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "env-openai"),
            ("GOOGLE_API_KEY", "env-google"),
            ("ANTHROPIC_API_KEY", "env-anthropic"),
        ]);
        let mut settings = Settings::default();
        settings.anthropic.api_key = Some("file-anthropic".to_string());
        settings.apply_env_fallbacks(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(settings.api_key(ServiceKind::OpenAI).as_deref(), Some("env-openai"));
        assert_eq!(settings.api_key(ServiceKind::Google).as_deref(), Some("env-google"));
        assert_eq!(
            settings.api_key(ServiceKind::Anthropic).as_deref(),
            Some("file-anthropic")
        );
        assert!(settings.api_key(ServiceKind::Custom).is_none());
    }
}
