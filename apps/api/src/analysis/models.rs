//! Analysis data model: the wire request, the validated input shapes and the
//! immutable result handed back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on recommendations in any result.
pub const MAX_RECOMMENDATIONS: usize = 3;
pub const MIN_DAY_RATING: u8 = 1;
pub const MAX_DAY_RATING: u8 = 10;

/// Request body of `POST /api/analysis/analyze`. One body carries either shape;
/// `into_input` decides which one is active.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub user_text: Option<String>,
    pub custom_prompt: Option<String>,

    pub calmness_rating: Option<i32>,
    pub energy_rating: Option<i32>,
    pub satisfaction_rating: Option<i32>,
    pub connection_rating: Option<i32>,
    pub engagement_rating: Option<i32>,

    pub current_state_text: Option<String>,
    pub energy_moments_text: Option<String>,
    pub missing_element_text: Option<String>,
}

/// Five 1–5 self-ratings plus three open answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub calmness: u8,
    pub energy: u8,
    pub satisfaction: u8,
    pub connection: u8,
    pub engagement: u8,
    pub current_state: String,
    pub energy_moments: String,
    pub missing_element: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisInput {
    FreeText {
        text: String,
        custom_prompt: Option<String>,
    },
    CheckIn(CheckIn),
}

/// Rating and recommendations mined from one model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structured {
    pub day_rating: Option<u8>,
    pub recommendations: Vec<String>,
}

impl Structured {
    /// Enforces the result invariants: rating within [1,10], at most three items,
    /// no blank items.
    pub fn normalized(self) -> Self {
        let day_rating = self
            .day_rating
            .map(|r| r.clamp(MIN_DAY_RATING, MAX_DAY_RATING));
        let recommendations = self
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .take(MAX_RECOMMENDATIONS)
            .collect();
        Self {
            day_rating,
            recommendations,
        }
    }
}

/// Outcome of one analysis. Built only through the constructors below, so a failed
/// result never carries a rating or recommendations meant for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    success: bool,
    analysis_text: Option<String>,
    day_rating: Option<u8>,
    recommendations: Vec<String>,
    analyzed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl AnalysisResult {
    pub fn success(analysis_text: String, structured: Structured) -> Self {
        let structured = structured.normalized();
        Self {
            success: true,
            analysis_text: Some(analysis_text),
            day_rating: structured.day_rating,
            recommendations: structured.recommendations,
            analyzed_at: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis_text: None,
            day_rating: None,
            recommendations: Vec::new(),
            analyzed_at: None,
            error: Some(error.into()),
        }
    }

    /// Failed result that still carries display-only guidance: a neutral rating and
    /// prompts nudging the user to write more. `success` stays false, so callers
    /// never persist it.
    pub fn needs_more_detail(
        error: impl Into<String>,
        neutral_rating: u8,
        prompts: &[&str],
    ) -> Self {
        Self {
            success: false,
            analysis_text: None,
            day_rating: Some(neutral_rating.clamp(MIN_DAY_RATING, MAX_DAY_RATING)),
            recommendations: prompts
                .iter()
                .take(MAX_RECOMMENDATIONS)
                .map(|p| p.to_string())
                .collect(),
            analyzed_at: None,
            error: Some(error.into()),
        }
    }

    pub fn day_rating(&self) -> Option<u8> {
        self.day_rating
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }
}

#[cfg(test)]
impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn analysis_text(&self) -> Option<&str> {
        self.analysis_text.as_deref()
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analyzed_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
