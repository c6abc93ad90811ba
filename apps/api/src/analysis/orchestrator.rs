//! End-to-end analysis: validate → gate → prompt → token → completion → interpret.
//!
//! The credential cache lock is released before the completion call starts, so
//! concurrent analyses only serialise on token renewal.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analysis::interpreter::{InterpretMode, ResponseInterpreter};
use crate::analysis::models::{AnalysisInput, AnalysisRequest, AnalysisResult};
use crate::analysis::prompt_builder::{Prompt, PromptBuilder};
use crate::analysis::validation::is_meaningful_text;
use crate::analysis::AnalysisError;
use crate::auth::TokenProvider;
use crate::llm_client::CompletionBackend;

pub struct Analyzer {
    prompts: PromptBuilder,
    interpreter: ResponseInterpreter,
    tokens: Arc<dyn TokenProvider>,
    completion: Arc<dyn CompletionBackend>,
}

impl Analyzer {
    pub fn new(
        prompts: PromptBuilder,
        tokens: Arc<dyn TokenProvider>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        let interpreter = ResponseInterpreter::default();
        debug!(
            "Interpreter chains: free text {:?}, check-in {:?}",
            interpreter.strategy_names(InterpretMode::FreeText),
            interpreter.strategy_names(InterpretMode::CheckIn)
        );
        Self {
            prompts,
            interpreter,
            tokens,
            completion,
        }
    }

    /// Validates a raw request and runs it. Validation and gate failures are
    /// returned as errors so the HTTP layer can pick a status code.
    pub async fn analyze_request(
        &self,
        request: AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let input = request.into_input()?;
        self.try_analyze(input).await
    }

    pub async fn try_analyze(&self, input: AnalysisInput) -> Result<AnalysisResult, AnalysisError> {
        let (prompt, mode) = self.prepare(&input)?;

        let token = self.tokens.bearer_token().await.map_err(|e| {
            warn!("Could not obtain access token: {e}");
            AnalysisError::from(e)
        })?;

        let raw_body = self
            .completion
            .complete(&prompt.system, &prompt.user, &token)
            .await
            .map_err(|e| {
                warn!("Completion request failed: {e}");
                AnalysisError::from(e)
            })?;

        let result = self.interpreter.interpret(mode, &raw_body);
        info!(
            "Analysis complete: mode={mode:?} rating={:?} recommendations={}",
            result.day_rating(),
            result.recommendations().len()
        );
        Ok(result)
    }

    /// Check-ins skip the meaningful-text gate; their structure is already enforced.
    fn prepare(&self, input: &AnalysisInput) -> Result<(Prompt, InterpretMode), AnalysisError> {
        match input {
            AnalysisInput::CheckIn(check_in) => Ok((
                self.prompts.build_check_in_prompt(check_in),
                InterpretMode::CheckIn,
            )),
            AnalysisInput::FreeText { text, custom_prompt } => {
                if !is_meaningful_text(text) {
                    info!("Free text rejected before completion: too little to analyse");
                    return Err(AnalysisError::NotMeaningful);
                }
                Ok((
                    self.prompts
                        .build_free_text_prompt(text, custom_prompt.as_deref()),
                    InterpretMode::FreeText,
                ))
            }
        }
    }
}
