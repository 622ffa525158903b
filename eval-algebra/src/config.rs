//! Evaluation configuration

use crate::metadata::{ErrorMetadata, RawMetadata};
use serde::{Deserialize, Serialize};

/// Configuration shared by predicate and rule evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Maximum number of predicates or rules processed in one call
    #[serde(default)]
    pub max_composition_size: Option<usize>,

    /// Attach caller metadata to failures
    #[serde(default)]
    pub debug: bool,

    /// Metadata attached when `debug` is set
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

impl EvalConfig {
    /// Config with a composition-size limit
    pub fn with_limit(max_composition_size: usize) -> Self {
        Self {
            max_composition_size: Some(max_composition_size),
            ..Self::default()
        }
    }

    /// Config with debug mode on and the given metadata
    pub fn debug(metadata: RawMetadata) -> Self {
        Self {
            debug: true,
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Validated metadata, or `None` unless debug mode is on
    pub fn error_metadata(&self) -> Option<ErrorMetadata> {
        if !self.debug {
            return None;
        }
        self.metadata.as_ref().and_then(RawMetadata::validate)
    }

    pub(crate) fn exceeds_limit(&self, size: usize) -> bool {
        self.max_composition_size.is_some_and(|limit| size > limit)
    }
}

/// Inclusive priority bounds; an absent bound is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityBounds {
    /// Lowest priority kept
    #[serde(default)]
    pub min_priority: Option<f64>,

    /// Highest priority kept
    #[serde(default)]
    pub max_priority: Option<f64>,
}

impl PriorityBounds {
    /// Bounds on both sides
    pub fn between(min_priority: f64, max_priority: f64) -> Self {
        Self {
            min_priority: Some(min_priority),
            max_priority: Some(max_priority),
        }
    }

    /// Whether a priority falls within the bounds
    pub fn contains(&self, priority: f64) -> bool {
        self.min_priority.map_or(true, |min| priority >= min)
            && self.max_priority.map_or(true, |max| priority <= max)
    }
}

/// Configuration for validating and preparing a rule set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetConfig {
    /// Maximum number of rules in the set
    #[serde(default)]
    pub max_composition_size: Option<usize>,

    /// Accept an empty rule set instead of failing
    #[serde(default)]
    pub allow_empty: bool,

    /// Priority window applied by `prepare`
    #[serde(default)]
    pub bounds: PriorityBounds,
}
