//! Response repair and parsing.
//!
//! Model output is expected, but not guaranteed, to contain one JSON object.
//! Extraction tries a fenced ```json block first, then the first
//! brace-balanced object in the text. The located payload is decoded into a
//! record whose absent fields take their defaults.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```[ \t]*(?i:json)[ \t]*\r?\n?\s*(\{.*?\})\s*```").unwrap();
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No structured payload found")]
    NoPayload,

    #[error("Payload is not a valid JSON object: {0}")]
    Decode(String),
}

/// Locates the structured payload inside free text.
pub trait PayloadExtractor: Send + Sync {
    fn extract<'a>(&self, raw: &'a str) -> Option<&'a str>;
}

/// Fenced-block search followed by a brace-balance scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedJsonExtractor;

impl PayloadExtractor for DelimitedJsonExtractor {
    fn extract<'a>(&self, raw: &'a str) -> Option<&'a str> {
        if let Some(found) = FENCED_JSON.captures(raw).and_then(|c| c.get(1)) {
            return Some(found.as_str());
        }
        first_balanced_object(raw)
    }
}

/// Returns the first `{...}` span whose braces balance, ignoring braces
/// inside JSON string literals.
fn first_balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts and decodes model output into a record type.
#[derive(Clone)]
pub struct ResponseParser {
    extractor: Arc<dyn PayloadExtractor>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(Arc::new(DelimitedJsonExtractor))
    }
}

impl ResponseParser {
    pub fn new(extractor: Arc<dyn PayloadExtractor>) -> Self {
        Self { extractor }
    }

    /// Returns the located payload text.
    pub fn extract<'a>(&self, raw: &'a str) -> Result<&'a str, ParseError> {
        self.extractor.extract(raw).ok_or(ParseError::NoPayload)
    }

    /// Extracts and strictly decodes one JSON object into `T`.
    pub fn parse<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ParseError> {
        let payload = self.extract(raw)?;
        let value: Value =
            serde_json::from_str(payload).map_err(|e| ParseError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(ParseError::Decode("payload is not an object".to_string()));
        }
        serde_json::from_value(value).map_err(|e| ParseError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::AspectAnalysis;

    fn parser() -> ResponseParser {
        ResponseParser::default()
    }

    #[test]
    fn test_fenced_and_bare_payloads_normalize_equally() {
        let fenced: AspectAnalysis = parser()
            .parse("```json\n{\"summary\":\"x\"}\n```")
            .unwrap();
        let bare: AspectAnalysis = parser().parse("{\"summary\":\"x\"}").unwrap();

        assert_eq!(fenced, bare);
        assert_eq!(fenced.summary, "x");
        assert!(fenced.observations.is_empty());
        assert_eq!(fenced.recommendations, "");
    }

    #[test]
    fn test_fenced_block_wins_over_earlier_braces() {
        let raw = "Set {like this} aside.\n```json\n{\"summary\": \"fenced\"}\n```";
        let record: AspectAnalysis = parser().parse(raw).unwrap();
        assert_eq!(record.summary, "fenced");
    }

    #[test]
    fn test_bare_object_surrounded_by_prose() {
        let raw = "Here is my analysis:\n{\"summary\": \"ok\", \"observations\": [\"a\"]}\nHope it helps!";
        let record: AspectAnalysis = parser().parse(raw).unwrap();
        assert_eq!(record.observations, vec!["a"]);
    }

    #[test]
    fn test_nested_objects_and_braces_in_strings() {
        let raw = r#"Result: {"summary": "uses {curly} braces", "meta": {"depth": 2}} trailing"#;
        let payload = parser().extract(raw).unwrap();
        assert_eq!(
            payload,
            r#"{"summary": "uses {curly} braces", "meta": {"depth": 2}}"#
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let raw = r#"{"summary": "say \"}\" twice"}"#;
        let record: AspectAnalysis = parser().parse(raw).unwrap();
        assert_eq!(record.summary, "say \"}\" twice");
    }

    #[test]
    fn test_no_payload() {
        assert_eq!(
            parser().parse::<AspectAnalysis>("I cannot help with that."),
            Err(ParseError::NoPayload)
        );
        assert_eq!(
            parser().parse::<AspectAnalysis>("Error: Generation timed out after 30s"),
            Err(ParseError::NoPayload)
        );
    }

    #[test]
    fn test_truncated_object_has_no_payload() {
        assert_eq!(
            parser().parse::<AspectAnalysis>("{\"summary\": \"cut of"),
            Err(ParseError::NoPayload)
        );
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let result = parser().parse::<AspectAnalysis>("{summary: 'single quotes'}");
        assert!(matches!(result, Err(ParseError::Decode(_))));
    }

    #[test]
    fn test_uppercase_fence_label() {
        let record: AspectAnalysis = parser()
            .parse("```JSON\n{\"summary\": \"upper\"}\n```")
            .unwrap();
        assert_eq!(record.summary, "upper");
    }

    struct StrictExtractor;

    impl PayloadExtractor for StrictExtractor {
        fn extract<'a>(&self, raw: &'a str) -> Option<&'a str> {
            let trimmed = raw.trim();
            (trimmed.starts_with('{') && trimmed.ends_with('}')).then_some(trimmed)
        }
    }

    #[test]
    fn test_extractor_is_swappable() {
        let strict = ResponseParser::new(Arc::new(StrictExtractor));
        assert!(strict.parse::<AspectAnalysis>("{\"summary\": \"x\"}").is_ok());
        assert_eq!(
            strict.parse::<AspectAnalysis>("prose {\"summary\": \"x\"}"),
            Err(ParseError::NoPayload)
        );
    }
}
