//! PromptBuilder: deterministic system/user prompt rendering for both input shapes.
//! No network, no state beyond the configured overrides.

use tracing::warn;

use crate::analysis::models::CheckIn;
use crate::analysis::prompts::{
    CALMNESS_LABEL, CHECK_IN_PROMPT_TEMPLATE, CHECK_IN_SYSTEM_TEMPLATE, CONNECTION_LABEL,
    CURRENT_STATE_LABEL, CUSTOM_PROMPT_SEPARATOR, ENERGY_LABEL, ENERGY_MOMENTS_LABEL,
    ENGAGEMENT_LABEL, FREE_TEXT_PROMPT_TEMPLATE, FREE_TEXT_SYSTEM, LEGACY_USER_TEXT_PLACEHOLDER,
    MISSING_ELEMENT_LABEL, SATISFACTION_LABEL, USER_TEXT_PLACEHOLDER,
};
use crate::llm_client::prompts::{EMPATHY_INSTRUCTION, JSON_ONLY_INSTRUCTION};

/// A rendered prompt pair, ready for the completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    system_prompt: Option<String>,
    user_prompt_template: Option<String>,
}

impl PromptBuilder {
    /// Blank overrides are treated as absent.
    pub fn new(system_prompt: Option<String>, user_prompt_template: Option<String>) -> Self {
        Self {
            system_prompt: system_prompt.filter(|s| !s.trim().is_empty()),
            user_prompt_template: user_prompt_template.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn build_free_text_prompt(&self, user_text: &str, custom_prompt: Option<&str>) -> Prompt {
        let system = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| FREE_TEXT_SYSTEM.to_string());

        let user = match custom_prompt.filter(|p| !p.trim().is_empty()) {
            Some(custom) => format!("{custom}{CUSTOM_PROMPT_SEPARATOR}{user_text}"),
            None => self
                .user_prompt_template
                .as_deref()
                .and_then(|template| {
                    let rendered = render_user_template(template, user_text);
                    if rendered.is_none() {
                        warn!("Configured user prompt template has no usable placeholder, using default");
                    }
                    rendered
                })
                .unwrap_or_else(|| default_free_text_prompt(user_text)),
        };

        Prompt { system, user }
    }

    pub fn build_check_in_prompt(&self, check_in: &CheckIn) -> Prompt {
        let ratings_block = [
            (CALMNESS_LABEL, check_in.calmness),
            (ENERGY_LABEL, check_in.energy),
            (SATISFACTION_LABEL, check_in.satisfaction),
            (CONNECTION_LABEL, check_in.connection),
            (ENGAGEMENT_LABEL, check_in.engagement),
        ]
        .iter()
        .map(|(label, value)| format!("- {label}: {value}/5"))
        .collect::<Vec<_>>()
        .join("\n");

        let answers_block = [
            (CURRENT_STATE_LABEL, &check_in.current_state),
            (ENERGY_MOMENTS_LABEL, &check_in.energy_moments),
            (MISSING_ELEMENT_LABEL, &check_in.missing_element),
        ]
        .iter()
        .map(|(label, answer)| format!("- {label}: {answer}"))
        .collect::<Vec<_>>()
        .join("\n");

        Prompt {
            system: CHECK_IN_SYSTEM_TEMPLATE.replace("{empathy_instruction}", EMPATHY_INSTRUCTION),
            user: CHECK_IN_PROMPT_TEMPLATE
                .replace("{ratings_block}", &ratings_block)
                .replace("{answers_block}", &answers_block),
        }
    }
}

fn default_free_text_prompt(user_text: &str) -> String {
    FREE_TEXT_PROMPT_TEMPLATE
        .replace("{json_only_instruction}", JSON_ONLY_INSTRUCTION)
        .replace(USER_TEXT_PLACEHOLDER, user_text)
}

/// `{user_text}` wins; otherwise exactly one legacy `%s`. Anything else is malformed.
fn render_user_template(template: &str, user_text: &str) -> Option<String> {
    if template.contains(USER_TEXT_PLACEHOLDER) {
        return Some(template.replace(USER_TEXT_PLACEHOLDER, user_text));
    }
    if template.matches(LEGACY_USER_TEXT_PLACEHOLDER).count() == 1 {
        return Some(template.replacen(LEGACY_USER_TEXT_PLACEHOLDER, user_text, 1));
    }
    None
}
