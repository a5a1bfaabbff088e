//! Stage field sets, agent output parsing and result rows.
//!
//! The extraction agent answers in loosely formatted JSON. Fresh answers are
//! parsed leniently (missing fields become empty strings); checkpoints read
//! back from disk must carry the complete field set to count as a hit.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::search::QueryBuilder;
use crate::utils::escape_newlines;

/// Prefix written into fields that could not be produced.
pub const ERROR_MARKER_PREFIX: &str = "ERROR: ";

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").expect("valid regex")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

/// Errors from parsing agent output or stored checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no JSON object found in agent output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("checkpoint is for stage {found}, expected stage {expected}")]
    StageMismatch { expected: u8, found: u8 },

    #[error("checkpoint holds unparsed agent output")]
    Unparsed,
}

/// A named set of string fields produced by one stage.
pub trait FieldSet: Default + Clone + Serialize + DeserializeOwned {
    /// Field names, in output order.
    const FIELDS: &'static [&'static str];

    /// Every field set to `value`.
    fn filled(value: &str) -> Self {
        let map: Map<String, Value> = Self::FIELDS
            .iter()
            .map(|name| (name.to_string(), Value::String(value.to_string())))
            .collect();
        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }
}

/// Stage-one fields extracted from the document itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInfo {
    pub product_code: String,
    pub product_name: String,
    pub manufacturer_supplier: String,
    pub product_item_number: String,
    pub ufi_code: String,
    pub current_sds_version: String,
    pub current_sds_date: String,
    pub language_country: String,
    pub intended_use: String,
}

impl FieldSet for ProductInfo {
    const FIELDS: &'static [&'static str] = &[
        "product_code",
        "product_name",
        "manufacturer_supplier",
        "product_item_number",
        "ufi_code",
        "current_sds_version",
        "current_sds_date",
        "language_country",
        "intended_use",
    ];
}

impl ProductInfo {
    /// Web query for the newest SDS of this product.
    ///
    /// Prefers the product name, then the product code, then the UFI. Returns
    /// `None` when none of them is usable.
    pub fn lookup_query(&self) -> Option<String> {
        let identity = [&self.product_name, &self.product_code, &self.ufi_code]
            .into_iter()
            .map(|value| value.trim())
            .find(|value| is_usable(value))?;

        let mut builder = QueryBuilder::new().phrase(identity);
        if is_usable(self.manufacturer_supplier.trim()) {
            builder = builder.term(&self.manufacturer_supplier);
        }
        Some(builder.term("SDS").build())
    }

    /// Pretty JSON rendering used in the stage-two prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn is_usable(value: &str) -> bool {
    !value.is_empty() && !value.starts_with(ERROR_MARKER_PREFIX)
}

/// Stage-two fields describing the newest SDS found on the web.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdsLookup {
    pub latest_sds_url: String,
    pub latest_sds_version: String,
    pub latest_sds_date: String,
}

impl FieldSet for SdsLookup {
    const FIELDS: &'static [&'static str] =
        &["latest_sds_url", "latest_sds_version", "latest_sds_date"];
}

impl SdsLookup {
    /// Lookup that failed: the marker goes in the URL column only.
    pub fn failed(reason: &str) -> Self {
        Self {
            latest_sds_url: error_marker(reason),
            ..Self::default()
        }
    }
}

/// One stage's agent output and the fields parsed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRecord<T> {
    pub output: String,
    pub fields: T,
}

/// Error marker value for a field that could not be produced.
pub fn error_marker(reason: &str) -> String {
    format!("{}{}", ERROR_MARKER_PREFIX, escape_newlines(reason))
}

/// Locate the JSON object inside free-form agent output.
fn locate_json(output: &str) -> Option<&str> {
    if let Some(captures) = FENCED_JSON.captures(output) {
        return captures.get(1).map(|m| m.as_str());
    }
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}

fn parse_object(output: &str) -> Result<Map<String, Value>, ParseError> {
    let trimmed = output.trim();

    // Some models return the object JSON-encoded as a string.
    if trimmed.starts_with('"') {
        if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(trimmed) {
            return parse_object(&inner);
        }
    }

    let candidate = locate_json(trimmed).ok_or(ParseError::NoJson)?;
    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(e) => {
            let repaired = TRAILING_COMMA.replace_all(candidate, "$1");
            serde_json::from_str::<Value>(&repaired).map_err(|_| ParseError::Json(e))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace([' ', '-'], "_")
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Build a field set from a parsed object.
///
/// With `strict`, every field must be present.
fn fields_from_object<T: FieldSet>(object: &Map<String, Value>, strict: bool) -> Result<T, ParseError> {
    let normalized: Map<String, Value> = object
        .iter()
        .map(|(key, value)| (normalize_key(key), value.clone()))
        .collect();

    let mut fields = Map::new();
    for &name in T::FIELDS {
        let value = match normalized.get(name) {
            Some(value) => value_to_string(value),
            None if strict => return Err(ParseError::MissingField(name)),
            None => String::new(),
        };
        fields.insert(name.to_string(), Value::String(value));
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Parse agent output into a field set.
///
/// Tolerates code fences, surrounding prose, trailing commas and non-string
/// values. With `strict`, a missing field is an error.
pub fn parse_fields<T: FieldSet>(output: &str, strict: bool) -> Result<T, ParseError> {
    let object = parse_object(output)?;
    fields_from_object(&object, strict)
}

/// Stored form of one stage checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub stage: u8,
    pub output: String,
    pub fields: Option<Map<String, Value>>,
}

impl CheckpointPayload {
    /// Encode a stage result. `fields` is `None` when the output did not parse.
    pub fn encode<T: FieldSet>(stage: u8, output: &str, fields: Option<&T>) -> String {
        let fields = fields.and_then(|f| match serde_json::to_value(f) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        });
        let payload = CheckpointPayload {
            stage,
            output: output.to_string(),
            fields,
        };
        serde_json::to_string_pretty(&payload).unwrap_or_default()
    }

    /// Decode a stored checkpoint, requiring the full field set.
    ///
    /// Also accepts legacy checkpoints that hold the agent's JSON answer
    /// directly or JSON-encoded as a string.
    pub fn decode<T: FieldSet>(stored: &str, stage: u8) -> Result<ExtractionRecord<T>, ParseError> {
        let value: Value = serde_json::from_str(stored.trim())?;

        if let Value::Object(ref map) = value {
            if map.contains_key("output") && map.contains_key("stage") {
                let payload: CheckpointPayload = serde_json::from_value(value)?;
                if payload.stage != stage {
                    return Err(ParseError::StageMismatch {
                        expected: stage,
                        found: payload.stage,
                    });
                }
                let fields = payload.fields.ok_or(ParseError::Unparsed)?;
                return Ok(ExtractionRecord {
                    fields: fields_from_object(&fields, true)?,
                    output: payload.output,
                });
            }
            return Ok(ExtractionRecord {
                fields: fields_from_object(map, true)?,
                output: stored.to_string(),
            });
        }

        match value {
            Value::String(output) => Ok(ExtractionRecord {
                fields: parse_fields(&output, true)?,
                output,
            }),
            _ => Err(ParseError::NotAnObject),
        }
    }
}

/// One line of the result table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub document: String,
    pub product_name: String,
    pub manufacturer_supplier: String,
    pub current_sds_version: String,
    pub current_sds_date: String,
    pub latest_sds_url: String,
    pub latest_sds_version: String,
    pub latest_sds_date: String,
}

impl ResultRow {
    /// Column names, in order.
    pub const HEADER: [&'static str; 8] = [
        "document",
        "product_name",
        "manufacturer_supplier",
        "current_sds_version",
        "current_sds_date",
        "latest_sds_url",
        "latest_sds_version",
        "latest_sds_date",
    ];

    pub fn new(document: &str, product: &ProductInfo, lookup: &SdsLookup) -> Self {
        Self {
            document: document.to_string(),
            product_name: product.product_name.clone(),
            manufacturer_supplier: product.manufacturer_supplier.clone(),
            current_sds_version: product.current_sds_version.clone(),
            current_sds_date: product.current_sds_date.clone(),
            latest_sds_url: lookup.latest_sds_url.clone(),
            latest_sds_version: lookup.latest_sds_version.clone(),
            latest_sds_date: lookup.latest_sds_date.clone(),
        }
    }

    /// Row for a document that could not be loaded.
    pub fn empty(document: &str) -> Self {
        Self {
            document: document.to_string(),
            ..Self::default()
        }
    }
}
