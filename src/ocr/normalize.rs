//! Normalization of raw OCR payloads into [`LineRecord`]s.
//!
//! The OCR library reports results in one of two layouts depending on its
//! version: a mapping with parallel `rec_texts`/`rec_scores`/`rec_boxes`
//! lists (sometimes unwrapped), or a list of `[box, [text, confidence]]`
//! pairs. Only the first element of the outer list is inspected. Anything
//! that cannot be parsed is kept as a single line holding the serialized
//! payload.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::confidence::{self, DEFAULT_CONFIDENCE};
use crate::core::geometry::BoundingBox;
use crate::core::model::LineRecord;

pub const RECOGNIZED_TEXTS: &str = "rec_texts";
pub const RECOGNIZED_SCORES: &str = "rec_scores";
pub const RECOGNIZED_BOXES: &str = "rec_boxes";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("`{0}` is not a list")]
    NotAList(&'static str),

    #[error("recognized text #{0} is not a string")]
    NonStringText(usize),

    #[error("none of the {0} line pairs is well formed")]
    NoUsablePairs(usize),

    #[error("unrecognized payload shape ({0})")]
    UnknownShape(&'static str),
}

/// Layout of the first element of a raw payload.
#[derive(Debug, Clone, Copy)]
pub enum RawShape<'a> {
    RecognizedTexts(&'a Map<String, Value>),
    LinePairs(&'a [Value]),
    Unknown(&'static str),
}

impl<'a> RawShape<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        let items = match raw {
            Value::Array(items) => items,
            // Some engine builds return the single result unwrapped.
            Value::Object(map) if map.contains_key(RECOGNIZED_TEXTS) => {
                return RawShape::RecognizedTexts(map);
            }
            other => return RawShape::Unknown(value_kind(other)),
        };
        match items.first() {
            Some(Value::Object(map)) if map.contains_key(RECOGNIZED_TEXTS) => {
                RawShape::RecognizedTexts(map)
            }
            Some(Value::Array(pairs)) => RawShape::LinePairs(pairs),
            Some(other) => RawShape::Unknown(value_kind(other)),
            None => RawShape::Unknown("empty list"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RawShape::RecognizedTexts(_) => "recognized-texts",
            RawShape::LinePairs(_) => "line-pairs",
            RawShape::Unknown(_) => "unknown",
        }
    }

    pub fn parse(&self) -> Result<Vec<LineRecord>, ParseError> {
        match self {
            RawShape::RecognizedTexts(map) => parse_recognized_texts(map),
            RawShape::LinePairs(pairs) => parse_line_pairs(pairs),
            RawShape::Unknown(kind) => Err(ParseError::UnknownShape(kind)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub lines: Vec<LineRecord>,
    /// Set when the payload could not be parsed and was stringified instead.
    pub fallback: Option<ParseError>,
}

/// True when the engine found nothing at all in the image.
pub fn is_empty_payload(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
        Value::Array(items) => match items.first() {
            None | Some(Value::Null) => true,
            Some(Value::Array(first)) => first.is_empty(),
            Some(_) => false,
        },
    }
}

pub fn normalize_payload(raw: &Value) -> Normalized {
    if let Some(dropped) = raw
        .as_array()
        .map(|items| items.len().saturating_sub(1))
        .filter(|dropped| *dropped > 0)
    {
        warn!(dropped, "OCR payload holds several results, only the first is used");
    }

    let shape = RawShape::detect(raw);
    match shape.parse() {
        Ok(lines) => {
            debug!(shape = shape.name(), lines = lines.len(), "parsed OCR payload");
            Normalized {
                lines,
                fallback: None,
            }
        }
        Err(err) => {
            warn!(
                shape = shape.name(),
                error = %err,
                payload = %raw,
                "could not parse OCR payload, keeping it as a single line"
            );
            Normalized {
                lines: vec![stringified_record(raw)],
                fallback: Some(err),
            }
        }
    }
}

pub fn stringified_record(raw: &Value) -> LineRecord {
    LineRecord {
        bounding_box: BoundingBox::empty(),
        text: raw.to_string(),
        confidence: DEFAULT_CONFIDENCE,
    }
}

fn parse_recognized_texts(map: &Map<String, Value>) -> Result<Vec<LineRecord>, ParseError> {
    let texts = optional_list(map, RECOGNIZED_TEXTS)?;
    let scores = optional_list(map, RECOGNIZED_SCORES)?;
    let boxes = optional_list(map, RECOGNIZED_BOXES)?;

    let mut lines = Vec::with_capacity(texts.len());
    for (idx, text) in texts.iter().enumerate() {
        let text = text.as_str().ok_or(ParseError::NonStringText(idx))?;
        if text.trim().is_empty() {
            continue;
        }
        let confidence = scores
            .get(idx)
            .and_then(Value::as_f64)
            .map(confidence::normalize)
            .unwrap_or(DEFAULT_CONFIDENCE);
        let bounding_box = boxes
            .get(idx)
            .map(BoundingBox::from_value)
            .unwrap_or_default();
        lines.push(LineRecord {
            bounding_box,
            text: text.to_string(),
            confidence,
        });
    }
    Ok(lines)
}

fn parse_line_pairs(pairs: &[Value]) -> Result<Vec<LineRecord>, ParseError> {
    let mut lines = Vec::with_capacity(pairs.len());
    let mut well_formed = 0usize;
    for (idx, pair) in pairs.iter().enumerate() {
        let Some(line) = parse_pair(pair) else {
            debug!(index = idx, "skipping malformed line pair");
            continue;
        };
        well_formed += 1;
        if !line.text.trim().is_empty() {
            lines.push(line);
        }
    }
    if well_formed == 0 {
        return Err(ParseError::NoUsablePairs(pairs.len()));
    }
    Ok(lines)
}

fn parse_pair(pair: &Value) -> Option<LineRecord> {
    let [bbox, recognition] = pair.as_array()?.as_slice() else {
        return None;
    };
    let [text, score] = recognition.as_array()?.as_slice() else {
        return None;
    };
    Some(LineRecord {
        bounding_box: BoundingBox::from_value(bbox),
        text: text.as_str()?.to_string(),
        confidence: confidence::normalize(score.as_f64()?),
    })
}

/// Missing or null entries read as an empty list.
fn optional_list<'a>(
    map: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a [Value], ParseError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ParseError::NotAList(field)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Point;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_recognized_texts_and_drops_blank_lines() {
        let raw = json!([{
            "rec_texts": ["ABC", "  "],
            "rec_scores": [0.95, 0.5],
            "rec_boxes": [[[0, 0], [1, 1]], []]
        }]);
        let normalized = normalize_payload(&raw);
        assert_eq!(normalized.fallback, None);
        assert_eq!(
            normalized.lines,
            vec![LineRecord {
                bounding_box: BoundingBox::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
                text: "ABC".to_string(),
                confidence: 0.95,
            }]
        );
    }

    #[test]
    fn missing_scores_and_boxes_use_defaults() {
        let raw = json!([{ "rec_texts": ["订单", "数量: 500斤"], "rec_scores": [0.7] }]);
        let lines = normalize_payload(&raw).lines;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].confidence, 0.7);
        assert_eq!(lines[1].confidence, DEFAULT_CONFIDENCE);
        assert!(lines.iter().all(|line| line.bounding_box.is_empty()));
    }

    #[test]
    fn flat_rec_boxes_become_corner_points() {
        let raw = json!([{ "rec_texts": ["XX化工"], "rec_boxes": [[10, 20, 110, 40]] }]);
        let lines = normalize_payload(&raw).lines;
        assert_eq!(
            lines[0].bounding_box.points,
            vec![Point::new(10.0, 20.0), Point::new(110.0, 40.0)]
        );
    }

    #[test]
    fn line_pairs_keep_order_and_skip_malformed() {
        let raw = json!([[
            [[[0, 0], [5, 0], [5, 2], [0, 2]], ["第一行", 0.91]],
            [[[0, 3], [5, 3]], ["bad arity"], "extra"],
            [[[0, 6], [5, 6], [5, 8], [0, 8]], ["第二行", 0.88]],
            [[], ["第三行"]],
            [[], ["第四行", 0.5]]
        ]]);
        let normalized = normalize_payload(&raw);
        assert_eq!(normalized.fallback, None);
        let texts: Vec<_> = normalized.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["第一行", "第二行", "第四行"]);
        assert_eq!(normalized.lines[1].confidence, 0.88);
        assert_eq!(normalized.lines[0].bounding_box.points.len(), 4);
    }

    #[test]
    fn unusable_pairs_fall_back_to_single_line() {
        let raw = json!([[["only one"]]]);
        let normalized = normalize_payload(&raw);
        assert_eq!(normalized.fallback, Some(ParseError::NoUsablePairs(1)));
        assert_eq!(normalized.lines.len(), 1);
        assert_eq!(normalized.lines[0].text, raw.to_string());
        assert_eq!(normalized.lines[0].confidence, DEFAULT_CONFIDENCE);
        assert!(normalized.lines[0].bounding_box.is_empty());
    }

    #[test]
    fn unknown_shapes_fall_back() {
        for raw in [json!(["plain text"]), json!({ "texts": ["x"] }), json!([{ "texts": [] }])] {
            let normalized = normalize_payload(&raw);
            assert!(matches!(normalized.fallback, Some(ParseError::UnknownShape(_))));
            assert_eq!(normalized.lines.len(), 1);
        }
    }

    #[test]
    fn bare_mapping_is_accepted() {
        let raw = json!({ "rec_texts": ["ABC", "  "], "rec_scores": [0.95, 0.5] });
        let normalized = normalize_payload(&raw);
        assert_eq!(normalized.fallback, None);
        assert_eq!(normalized.lines.len(), 1);
        assert_eq!(normalized.lines[0].confidence, 0.95);
    }

    #[test]
    fn type_errors_inside_known_shape_fall_back() {
        let raw = json!([{ "rec_texts": ["ok", 42] }]);
        let normalized = normalize_payload(&raw);
        assert_eq!(normalized.fallback, Some(ParseError::NonStringText(1)));
        assert_eq!(normalized.lines.len(), 1);

        let raw = json!([{ "rec_texts": ["ok"], "rec_scores": "0.9" }]);
        let normalized = normalize_payload(&raw);
        assert_eq!(
            normalized.fallback,
            Some(ParseError::NotAList(RECOGNIZED_SCORES))
        );
    }

    #[test]
    fn only_first_result_is_used() {
        let raw = json!([
            { "rec_texts": ["page one"] },
            { "rec_texts": ["page two"] }
        ]);
        let lines = normalize_payload(&raw).lines;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "page one");
    }

    #[test]
    fn detects_empty_payloads() {
        assert!(is_empty_payload(&json!([])));
        assert!(is_empty_payload(&json!(null)));
        assert!(is_empty_payload(&json!([null])));
        assert!(is_empty_payload(&json!([[]])));
        assert!(is_empty_payload(&json!({})));
        assert!(!is_empty_payload(&json!([{ "rec_texts": [] }])));
        assert!(!is_empty_payload(&json!("text")));
    }
}
