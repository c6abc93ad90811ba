// Day analysis: free-text and check-in inputs → prompt → completion → structured result.
// All completion calls go through llm_client; credentials come from auth.

use thiserror::Error;

use crate::analysis::models::AnalysisResult;
use crate::analysis::prompts::{NEEDS_MORE_DETAIL_MESSAGE, NEEDS_MORE_DETAIL_PROMPTS};
use crate::auth::CredentialError;
use crate::llm_client::TransportError;

pub mod handlers;
pub mod heuristics;
pub mod interpreter;
pub mod models;
pub mod orchestrator;
pub mod prompt_builder;
pub mod prompts;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::Analyzer;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Free-text request has no text")]
    EmptyText,

    #[error("Check-in request is incomplete or has ratings outside 1..=5")]
    IncompleteCheckIn,

    #[error("Free text is too short to analyse")]
    NotMeaningful,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AnalysisError {
    /// Message shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::EmptyText => "Текст для анализа не может быть пустым".to_string(),
            AnalysisError::IncompleteCheckIn => "Пожалуйста, заполните все поля чекапа".to_string(),
            AnalysisError::NotMeaningful => NEEDS_MORE_DETAIL_MESSAGE.to_string(),
            AnalysisError::Credential(e) => format!("Не удалось получить токен доступа к AI API: {e}"),
            AnalysisError::Transport(e) => match (e.status(), e.body()) {
                (Some(status), Some(body)) => {
                    format!("Ошибка при обращении к AI API: {status} {body}")
                }
                _ => format!("Ошибка соединения с AI API: {e}"),
            },
        }
    }

    /// The structured failure handed to callers instead of a raw error.
    pub fn to_result(&self) -> AnalysisResult {
        match self {
            AnalysisError::NotMeaningful => AnalysisResult::needs_more_detail(
                self.user_message(),
                heuristics::NEUTRAL_RATING,
                &NEEDS_MORE_DETAIL_PROMPTS,
            ),
            _ => AnalysisResult::failure(self.user_message()),
        }
    }
}
