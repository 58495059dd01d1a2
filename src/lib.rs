use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub mod batch;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod hover;
pub mod locator;
pub mod logging;
pub mod progress;
pub mod services;
pub mod session;
pub mod settings;
pub mod state;

pub use coordinator::PageTranslator;
pub use document::Document;
pub use error::{PageError, PageResult, StateError};
pub use locator::{Scope, TextUnit, UnitId};
pub use progress::{EventKind, ProgressEvent, ProgressReport, ProgressSink};
pub use services::{BatchTranslation, CachedTranslator, ServiceKind, Translate};
pub use session::{ControlCommand, SessionControl, SessionOutcome, SessionRequest};
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub lang: Option<String>,
    pub service: Option<String>,
    pub concurrency: Option<usize>,
    pub batch_size: Option<usize>,
    pub context: Option<String>,
    pub selector: Option<String>,
    pub settings_path: Option<String>,
    pub no_indicator: bool,
    pub no_hover: bool,
    pub no_cache: bool,
    pub show_languages: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub text: String,
    pub outcome: Option<SessionOutcome>,
}

/// Translates an HTML document end to end and returns the rewritten markup.
pub async fn run<S>(
    config: Config,
    input: Option<String>,
    control: SessionControl,
    sink: &S,
) -> Result<RunOutput>
where
    S: ProgressSink + ?Sized,
{
    if config.show_languages {
        return Ok(RunOutput {
            text: format_languages(),
            outcome: None,
        });
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let input = input.unwrap_or_default();
    if input.trim().is_empty() {
        return Err(anyhow!("input document is empty"));
    }

    let (kind, request) = resolve_request(&config, &settings)?;
    let service = services::build_service(&settings, kind)?;

    let document = Document::parse(&input);
    let scope = match config.selector.as_deref() {
        Some(selector) => Scope::Subtree(
            document
                .select_first(selector)
                .with_context(|| format!("no element matches selector '{}'", selector))?,
        ),
        None => Scope::Document,
    };
    let request = match config.context.as_deref() {
        Some(context) => request.with_context(context.trim()),
        None => request.with_context(document.title().unwrap_or_default()),
    };

    let translator = PageTranslator::new(document);
    let outcome = if config.no_cache {
        translator
            .translate(&request, &scope, &service, control, sink)
            .await?
    } else {
        let cached = CachedTranslator::new(service, kind.as_str());
        translator
            .translate(&request, &scope, &cached, control, sink)
            .await?
    };

    Ok(RunOutput {
        text: translator.document().to_html(),
        outcome: Some(outcome),
    })
}

/// Merges command line overrides over settings.
pub fn resolve_request(
    config: &Config,
    settings: &Settings,
) -> Result<(ServiceKind, SessionRequest)> {
    let kind = match config.service.as_deref() {
        Some(service) => service.parse::<ServiceKind>()?,
        None => settings.service,
    };
    let lang = config
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(settings.target_language.as_str())
        .to_string();

    let mut request = SessionRequest::new(lang, kind.as_str())
        .with_concurrency(config.concurrency.unwrap_or(settings.parallel_requests))
        .with_batch_size(config.batch_size.unwrap_or(settings.batch_size));
    request.show_indicator = settings.show_translation_indicator && !config.no_indicator;
    request.hover = settings.show_original_on_hover && !config.no_hover;
    Ok((kind, request))
}

fn format_languages() -> String {
    services::languages::supported_codes()
        .map(|code| format!("{}\t{}", code, services::languages::language_name(code)))
        .collect::<Vec<_>>()
        .join("\n")
}
