//! ResponseInterpreter: turns one raw completion body into an `AnalysisResult`.
//!
//! 1. Envelope extraction (typed envelope → `"text"` scan → whole body).
//! 2. An ordered list of extraction strategies; the first `Some` wins:
//!    free text: StructuredJson → HeuristicPatterns → SentimentFallback
//!    check-in:  HeuristicPatterns → SentimentFallback
//!
//! Never fails: the sentiment fallback always produces a result, so ambiguity in
//! the model's text degrades the answer instead of erroring.

use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::heuristics::{
    count_sentiment, extract_listed_recommendations, extract_rating,
    extract_sentence_recommendations, sentiment_rating,
};
use crate::analysis::models::{AnalysisResult, Structured, MAX_DAY_RATING, MIN_DAY_RATING};
use crate::llm_client::envelope::{extract_text, TextSource};
use crate::llm_client::strip_json_fences;

/// One way of reading structure out of model text.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, text: &str) -> Option<Structured>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretMode {
    FreeText,
    CheckIn,
}

/// `{"dayRating": N, "recommendations": [...]}`, optionally fenced or embedded in prose.
pub struct StructuredJson;

impl ExtractionStrategy for StructuredJson {
    fn name(&self) -> &'static str {
        "structured_json"
    }

    fn extract(&self, text: &str) -> Option<Structured> {
        let candidate = strip_json_fences(text);
        let root = serde_json::from_str::<Value>(candidate)
            .ok()
            .or_else(|| embedded_object(candidate))?;
        let object = root.as_object()?;

        let rating = object.get("dayRating")?;
        let recommendations = object.get("recommendations")?.as_array()?;

        Some(Structured {
            day_rating: coerce_rating(rating),
            recommendations: recommendations.iter().filter_map(value_as_text).collect(),
        })
    }
}

/// Regex-mined rating and recommendations.
///
/// A mined rating wins and pairs with the listed items, or with prose sentences when
/// the reply has no list. Listed items without a mined rating take the sentiment
/// rating. With neither there is nothing to claim and the chain moves on.
pub struct HeuristicPatterns;

impl ExtractionStrategy for HeuristicPatterns {
    fn name(&self) -> &'static str {
        "heuristic_patterns"
    }

    fn extract(&self, text: &str) -> Option<Structured> {
        let listed = extract_listed_recommendations(text);
        match extract_rating(text) {
            Some(rating) => Some(Structured {
                day_rating: Some(rating),
                recommendations: if listed.is_empty() {
                    extract_sentence_recommendations(text)
                } else {
                    listed
                },
            }),
            None if !listed.is_empty() => Some(Structured {
                day_rating: Some(sentiment_rating(count_sentiment(text))),
                recommendations: listed,
            }),
            None => None,
        }
    }
}

/// Last resort: rating from word-root sentiment, the whole text as the one recommendation.
pub struct SentimentFallback;

impl ExtractionStrategy for SentimentFallback {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn extract(&self, text: &str) -> Option<Structured> {
        let counts = count_sentiment(text);
        let text = text.trim();
        Some(Structured {
            day_rating: Some(sentiment_rating(counts)),
            recommendations: if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            },
        })
    }
}

pub struct ResponseInterpreter {
    free_text: Vec<Box<dyn ExtractionStrategy>>,
    check_in: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self {
            free_text: vec![
                Box::new(StructuredJson),
                Box::new(HeuristicPatterns),
                Box::new(SentimentFallback),
            ],
            check_in: vec![Box::new(HeuristicPatterns), Box::new(SentimentFallback)],
        }
    }
}

impl ResponseInterpreter {
    fn strategies(&self, mode: InterpretMode) -> &[Box<dyn ExtractionStrategy>] {
        match mode {
            InterpretMode::FreeText => &self.free_text,
            InterpretMode::CheckIn => &self.check_in,
        }
    }

    pub fn strategy_names(&self, mode: InterpretMode) -> Vec<&'static str> {
        self.strategies(mode).iter().map(|s| s.name()).collect()
    }

    /// Applies the strategy chain to already-extracted model text.
    pub fn interpret_text(&self, mode: InterpretMode, text: &str) -> Structured {
        self.strategies(mode)
            .iter()
            .find_map(|strategy| {
                let structured = strategy.extract(text)?;
                debug!("Model reply interpreted by {}", strategy.name());
                Some(structured)
            })
            .unwrap_or_default()
    }

    pub fn interpret(&self, mode: InterpretMode, raw_body: &str) -> AnalysisResult {
        let (text, source) = extract_text(raw_body);
        if source != TextSource::Envelope {
            warn!("Completion envelope did not match schema, using {source:?} text");
        }
        let structured = self.interpret_text(mode, &text);
        AnalysisResult::success(text, structured)
    }
}

/// First `{` through last `}` of prose that wraps a JSON object.
fn embedded_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Integer coercion: numbers truncate, numeric strings parse, everything else is unset.
fn coerce_rating(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))?
        }
        _ => return None,
    };
    Some(raw.clamp(MIN_DAY_RATING as i64, MAX_DAY_RATING as i64) as u8)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}
