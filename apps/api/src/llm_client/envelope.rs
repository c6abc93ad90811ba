//! Typed schema of the completion response envelope plus the fallbacks used when
//! the body does not match it.
//!
//! `{"result":{"alternatives":[{"message":{"text":..}}],"usage":{..}}}`. Other fields
//! the provider sends are ignored.
//! Every level is optional so a partial envelope still deserializes and the missing
//! field is reported explicitly instead of failing the whole parse.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static TEXT_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""text"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid text field regex")
});

#[derive(Debug, Default, Deserialize)]
pub struct CompletionEnvelope {
    pub result: Option<CompletionResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Alternative {
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub text: Option<String>,
}

/// Token counts arrive as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_text_tokens: Option<String>,
    pub completion_tokens: Option<String>,
    pub total_tokens: Option<String>,
}

/// Which rung of the extraction ladder produced the candidate text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Envelope,
    Scanned,
    RawBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Result,
    Alternatives,
    Message,
    Text,
}

impl CompletionEnvelope {
    /// Walks `result.alternatives[0].message.text`.
    pub fn first_text(&self) -> Result<&str, MissingField> {
        let result = self.result.as_ref().ok_or(MissingField::Result)?;
        let first = result.alternatives.first().ok_or(MissingField::Alternatives)?;
        let message = first.message.as_ref().ok_or(MissingField::Message)?;
        message.text.as_deref().ok_or(MissingField::Text)
    }
}

/// Candidate model text: the envelope path, else the first `"text":"..."` in the body,
/// else the whole body.
pub fn extract_text(raw_body: &str) -> (String, TextSource) {
    if let Ok(envelope) = serde_json::from_str::<CompletionEnvelope>(raw_body) {
        if let Some(usage) = envelope.result.as_ref().and_then(|r| r.usage.as_ref()) {
            tracing::debug!(
                "Completion usage: input={:?} completion={:?} total={:?}",
                usage.input_text_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }
        match envelope.first_text() {
            Ok(text) => return (text.to_string(), TextSource::Envelope),
            Err(missing) => {
                tracing::debug!("Completion envelope missing {missing:?}, scanning body");
            }
        }
    }

    if let Some(text) = scan_text_field(raw_body) {
        return (text, TextSource::Scanned);
    }

    (raw_body.to_string(), TextSource::RawBody)
}

fn scan_text_field(raw_body: &str) -> Option<String> {
    let escaped = TEXT_FIELD_RE.captures(raw_body)?.get(1)?.as_str();
    // Re-quote and let serde undo the JSON escapes; keep the raw slice if that fails.
    let unescaped = serde_json::from_str::<String>(&format!("\"{escaped}\""))
        .unwrap_or_else(|_| escaped.to_string());
    Some(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_text_from_well_formed_envelope() {
        let body = r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"Привет"},"status":"ALTERNATIVE_STATUS_FINAL"}],"usage":{"inputTextTokens":"10","completionTokens":"5","totalTokens":"15"},"modelVersion":"23.10.2024"}}"#;
        let (text, source) = extract_text(body);
        assert_eq!(text, "Привет");
        assert_eq!(source, TextSource::Envelope);
    }

    #[test]
    fn test_usage_is_typed_and_extra_fields_ignored() {
        let body = r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"x"},"status":"FINAL"}],"usage":{"totalTokens":"15"},"modelVersion":"1"}}"#;
        let envelope: CompletionEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.first_text(), Ok("x"));
        let result = envelope.result.unwrap();
        assert_eq!(result.usage.unwrap().total_tokens.as_deref(), Some("15"));
    }

    #[test]
    fn test_reports_which_field_is_missing() {
        let cases = [
            ("{}", MissingField::Result),
            (r#"{"result":{}}"#, MissingField::Alternatives),
            (r#"{"result":{"alternatives":[{}]}}"#, MissingField::Message),
            (r#"{"result":{"alternatives":[{"message":{}}]}}"#, MissingField::Text),
        ];
        for (body, expected) in cases {
            let envelope: CompletionEnvelope = serde_json::from_str(body).unwrap();
            assert_eq!(envelope.first_text().unwrap_err(), expected, "body: {body}");
        }
    }

    #[test]
    fn test_truncated_body_falls_back_to_text_scan() {
        let body = r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"Рейтинг: 7\nхорошо"}"#;
        let (text, source) = extract_text(body);
        assert_eq!(text, "Рейтинг: 7\nхорошо");
        assert_eq!(source, TextSource::Scanned);
    }

    #[test]
    fn test_scan_handles_escaped_quotes() {
        let body = r#"garbage "text": "он сказал \"привет\"" trailing"#;
        let (text, source) = extract_text(body);
        assert_eq!(text, "он сказал \"привет\"");
        assert_eq!(source, TextSource::Scanned);
    }

    #[test]
    fn test_unrecognized_body_is_used_whole() {
        let body = "plain text reply with no envelope";
        let (text, source) = extract_text(body);
        assert_eq!(text, body);
        assert_eq!(source, TextSource::RawBody);
    }

    #[test]
    fn test_envelope_without_text_scans_then_uses_body() {
        let body = r#"{"result":{"alternatives":[]}}"#;
        let (text, source) = extract_text(body);
        assert_eq!(text, body);
        assert_eq!(source, TextSource::RawBody);
    }
}
