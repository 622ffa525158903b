//! Error types for the login risk engine

use crate::signals::SignalViolation;
use eval_algebra::{PredicateFailure, RuleFailure};
use thiserror::Error;

/// Login risk error
#[derive(Debug, Error)]
pub enum Error {
    /// One or more blocking signal violations; no assessment is produced
    #[error("Invalid {domain} signals: {}", join_violations(.violations))]
    InvalidSignals {
        /// Signal domain, e.g. `risk`
        domain: &'static str,
        /// Every blocking violation, in detection order
        violations: Vec<SignalViolation>,
    },

    /// Policy rejected at engine construction
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rule catalog predicate could not be composed
    #[error("Predicate failure: {0}")]
    Predicates(#[from] PredicateFailure),

    /// Rule catalog could not be prepared or evaluated
    #[error("Rule failure: {0}")]
    Rules(#[from] RuleFailure),
}

fn join_violations(violations: &[SignalViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{Severity, SignalCode};

    #[test]
    fn test_invalid_signals_message_lists_every_violation() {
        let err = Error::InvalidSignals {
            domain: "risk",
            violations: vec![
                SignalViolation::new(
                    SignalCode::InvalidReputationScore,
                    "out_of_range",
                    Severity::Block,
                ),
                SignalViolation::new(
                    SignalCode::InvalidVelocityScore,
                    "not_finite",
                    Severity::Degrade,
                ),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Invalid risk signals: INVALID_REPUTATION_SCORE(out_of_range), \
             INVALID_VELOCITY_SCORE(not_finite)"
        );
    }

    #[test]
    fn test_algebra_failures_convert() {
        let err: Error = RuleFailure::EmptyRules.into();
        assert!(matches!(err, Error::Rules(RuleFailure::EmptyRules)));
    }
}
