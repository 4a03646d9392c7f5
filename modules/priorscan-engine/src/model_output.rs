//! Defensive parsing of model completions.
//!
//! Models wrap JSON in markdown fences or preamble text often enough that
//! every parse site goes through here: strip fences, locate the outermost
//! JSON object, then hand the result to serde. Failures come back as a
//! typed error so callers can take their documented fallback path instead
//! of guessing at partial success.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object in model output")]
    NoJson,

    #[error("model output failed to deserialize: {0}")]
    Deserialize(String),

    #[error("model output missing required field: {0}")]
    MissingField(&'static str),
}

/// Strip markdown code fences and any text around the outermost JSON
/// object.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    let inner = if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the info string ("json") and the closing fence.
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.trim().strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    };

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&inner[start..=end])
}

pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let json = extract_json(text).ok_or(ParseError::NoJson)?;
    serde_json::from_str(json).map_err(|e| ParseError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Shape {
        value: u32,
    }

    #[test]
    fn parses_bare_json() {
        let parsed: Shape = parse_json(r#"{"value": 3}"#).unwrap();
        assert_eq!(parsed.value, 3);
    }

    #[test]
    fn strips_fenced_json() {
        let text = "```json\n{\"value\": 7}\n```";
        let parsed: Shape = parse_json(text).unwrap();
        assert_eq!(parsed.value, 7);
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = "Here is the analysis you asked for:\n{\"value\": 9}\nLet me know!";
        let parsed: Shape = parse_json(text).unwrap();
        assert_eq!(parsed.value, 9);
    }

    #[test]
    fn reports_missing_json() {
        let err = parse_json::<Shape>("no structure here").unwrap_err();
        assert!(matches!(err, ParseError::NoJson));
    }

    #[test]
    fn reports_deserialize_failure() {
        let err = parse_json::<Shape>(r#"{"value": "not a number"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Deserialize(_)));
    }
}
