use anyhow::{Context, Result};
use tera::{Context as TeraContext, Tera};

use super::languages::language_name;

const TRANSLATE_TEMPLATE: &str = include_str!("prompts/translate.tera");

const TRANSLATOR_ROLE: &str = "You are a professional translator. Consider the webpage context to provide natural translations without changing the original meaning.";
const ORDER_RULE: &str = "Return the translations in the same order, separated by newlines.";

/// System message for chat-style APIs.
pub fn system_prompt() -> String {
    format!("{} {}", TRANSLATOR_ROLE, ORDER_RULE)
}

/// Numbered list of texts, preceded by the page context when there is one.
pub fn render_prompt(texts: &[String], target_language: &str, context: &str) -> Result<String> {
    let mut tera_context = TeraContext::new();
    tera_context.insert("context", context.trim());
    tera_context.insert("language", language_name(target_language));
    tera_context.insert("texts", texts);
    Tera::one_off(TRANSLATE_TEMPLATE, &tera_context, false)
        .with_context(|| "failed to render translation prompt")
}

/// Single-message variant for APIs without a system role: the instructions
/// are prepended to the rendered prompt.
pub fn render_inline_prompt(
    texts: &[String],
    target_language: &str,
    context: &str,
) -> Result<String> {
    let prompt = render_prompt(texts, target_language, context)?;
    Ok(format!(
        "{} Translate the following texts to {}. {}\n\n{}",
        TRANSLATOR_ROLE,
        language_name(target_language),
        ORDER_RULE,
        prompt
    ))
}
