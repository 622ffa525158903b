//! Login risk engine
//!
//! Scores authentication attempts from device, network, geographic and
//! velocity signals, evaluates a prioritized rule catalog, and resolves an
//! allow / challenge / block decision.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod rules;
pub mod scoring;
pub mod signals;
pub mod types;

pub use config::{EngineConfig, RiskPolicy, RiskThresholds, RiskWeights, RuleEvaluationMode};
pub use context::{ContextBuilderPlugin, RuleContext, ScoringContext};
pub use engine::{assess_login_risk, AuditHook, RiskEngine};
pub use error::{Error, Result};
pub use rules::{RuleCatalog, RuleImpact, TriggeredRule};
pub use scoring::{CategoryScores, RiskScorer};
pub use signals::{Severity, SignalCode, SignalViolation};
pub use types::*;
