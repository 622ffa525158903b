//! Debug-only diagnostic metadata
//!
//! Callers may attach metadata to evaluation errors when debug mode is on.
//! Each field is validated on its own: a malformed field is dropped without
//! affecting the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metadata exactly as the caller supplied it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMetadata {
    /// RFC 3339 string or non-negative epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<Value>,

    /// Object mapping flag names to booleans
    #[serde(default)]
    pub feature_flags: Option<Value>,

    /// Arbitrary object
    #[serde(default)]
    pub context: Option<Value>,
}

/// Validated metadata attached to failures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorMetadata {
    /// When the evaluation was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Feature flags active for the evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_flags: Option<BTreeMap<String, bool>>,

    /// Free-form caller context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl ErrorMetadata {
    /// True when every field was dropped
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.feature_flags.is_none() && self.context.is_none()
    }
}

impl RawMetadata {
    /// Validate each field independently.
    ///
    /// Returns `None` when no field survives.
    pub fn validate(&self) -> Option<ErrorMetadata> {
        let metadata = ErrorMetadata {
            timestamp: self.timestamp.as_ref().and_then(parse_timestamp),
            feature_flags: self.feature_flags.as_ref().and_then(parse_feature_flags),
            context: match &self.context {
                Some(Value::Object(map)) => Some(map.clone()),
                _ => None,
            },
        };

        (!metadata.is_empty()).then_some(metadata)
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .filter(|millis| *millis >= 0)
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_feature_flags(value: &Value) -> Option<BTreeMap<String, bool>> {
    let Value::Object(map) = value else {
        return None;
    };

    map.iter()
        .map(|(name, enabled)| enabled.as_bool().map(|b| (name.clone(), b)))
        .collect()
}
