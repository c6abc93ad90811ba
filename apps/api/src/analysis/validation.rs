//! Input validation. Covers shape disambiguation, check-in completeness and the
//! free-text meaningfulness gate. All of it runs before any network call.

use crate::analysis::models::{AnalysisInput, AnalysisRequest, CheckIn};
use crate::analysis::AnalysisError;

const CHECK_IN_RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;
/// Texts shorter than this are never meaningful.
const MIN_TEXT_CHARS: usize = 10;
/// A single "word" (no spaces) must be at least this long to be analysed.
const MIN_SPACELESS_TEXT_CHARS: usize = 20;

impl AnalysisRequest {
    /// All five ratings present ⇒ check-in, anything else ⇒ free text.
    pub fn into_input(self) -> Result<AnalysisInput, AnalysisError> {
        let ratings = [
            self.calmness_rating,
            self.energy_rating,
            self.satisfaction_rating,
            self.connection_rating,
            self.engagement_rating,
        ];

        if let [Some(calmness), Some(energy), Some(satisfaction), Some(connection), Some(engagement)] =
            ratings
        {
            let rating = |value: i32| -> Result<u8, AnalysisError> {
                if CHECK_IN_RATING_RANGE.contains(&value) {
                    Ok(value as u8)
                } else {
                    Err(AnalysisError::IncompleteCheckIn)
                }
            };
            let answer = |value: Option<String>| -> Result<String, AnalysisError> {
                value
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or(AnalysisError::IncompleteCheckIn)
            };

            return Ok(AnalysisInput::CheckIn(CheckIn {
                calmness: rating(calmness)?,
                energy: rating(energy)?,
                satisfaction: rating(satisfaction)?,
                connection: rating(connection)?,
                engagement: rating(engagement)?,
                current_state: answer(self.current_state_text)?,
                energy_moments: answer(self.energy_moments_text)?,
                missing_element: answer(self.missing_element_text)?,
            }));
        }

        let text = self
            .user_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(AnalysisError::EmptyText)?;
        let custom_prompt = self.custom_prompt.filter(|p| !p.trim().is_empty());

        Ok(AnalysisInput::FreeText {
            text,
            custom_prompt,
        })
    }
}

/// Free-text gate: under 10 characters, or a single token under 20, is not worth
/// a completion call.
pub fn is_meaningful_text(text: &str) -> bool {
    let text = text.trim();
    let chars = text.chars().count();
    if chars < MIN_TEXT_CHARS {
        return false;
    }
    if !text.contains(char::is_whitespace) && chars < MIN_SPACELESS_TEXT_CHARS {
        return false;
    }
    true
}
