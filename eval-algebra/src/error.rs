//! Failure taxonomies for predicate and rule composition

use crate::metadata::ErrorMetadata;
use std::fmt;
use thiserror::Error;

/// Error type returned by caller-supplied predicates, steps and hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Diagnostic details carried by composition and evaluation failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostic {
    /// Position of the failing element (or the last element for finalize)
    pub index: usize,

    /// Error message, when one was raised
    pub message: Option<String>,

    /// Chain of underlying causes, innermost last
    pub stack: Option<String>,

    /// Debug metadata, attached only when debug mode is on
    pub metadata: Option<ErrorMetadata>,
}

impl Diagnostic {
    /// Diagnostic for a composition that crossed its size limit
    pub fn limit_exceeded(limit: usize, metadata: Option<ErrorMetadata>) -> Self {
        Self {
            index: limit,
            message: Some(format!("composition exceeds limit of {} elements", limit)),
            stack: None,
            metadata,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "at index {}: {}", self.index, message),
            None => write!(f, "at index {}", self.index),
        }
    }
}

/// Predicate algebra failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateFailure {
    /// No predicates were supplied
    #[error("no predicates supplied")]
    EmptyPredicates,

    /// A slot held no predicate
    #[error("invalid predicate at index {index}")]
    InvalidPredicate {
        /// Offending position
        index: usize,
    },

    /// Size limit exceeded or the fold could not be set up
    #[error("composition error {0}")]
    CompositionError(Diagnostic),

    /// A predicate, step or finalize raised an error
    #[error("evaluation error {0}")]
    EvaluationError(Diagnostic),
}

impl PredicateFailure {
    /// Stable tag for this failure kind
    pub fn tag(&self) -> &'static str {
        match self {
            PredicateFailure::EmptyPredicates => "EMPTY_PREDICATES",
            PredicateFailure::InvalidPredicate { .. } => "INVALID_PREDICATE",
            PredicateFailure::CompositionError(_) => "COMPOSITION_ERROR",
            PredicateFailure::EvaluationError(_) => "EVALUATION_ERROR",
        }
    }

    /// Diagnostic payload, if this kind carries one
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            PredicateFailure::CompositionError(d) | PredicateFailure::EvaluationError(d) => Some(d),
            _ => None,
        }
    }
}

/// Rule algebra failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleFailure {
    /// Malformed rule shape
    #[error("invalid rule at index {index}: {reason}")]
    InvalidRule {
        /// Offending position
        index: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Embedded predicate rejected by the caller's guard
    #[error("invalid predicate in rule at index {index}")]
    InvalidPredicate {
        /// Offending position
        index: usize,
    },

    /// Priority is NaN or infinite
    #[error("invalid priority {priority} at index {index}")]
    InvalidPriority {
        /// Offending position
        index: usize,
        /// The rejected value
        priority: f64,
    },

    /// No rules were supplied
    #[error("no rules supplied")]
    EmptyRules,

    /// Size limit exceeded, or init/step/finalize raised an error
    #[error("composition error {0}")]
    CompositionError(Diagnostic),
}

impl RuleFailure {
    /// Stable tag for this failure kind
    pub fn tag(&self) -> &'static str {
        match self {
            RuleFailure::InvalidRule { .. } => "INVALID_RULE",
            RuleFailure::InvalidPredicate { .. } => "INVALID_PREDICATE",
            RuleFailure::InvalidPriority { .. } => "INVALID_PRIORITY",
            RuleFailure::EmptyRules => "EMPTY_RULES",
            RuleFailure::CompositionError(_) => "COMPOSITION_ERROR",
        }
    }

    /// Diagnostic payload, if this kind carries one
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RuleFailure::CompositionError(d) => Some(d),
            _ => None,
        }
    }
}
