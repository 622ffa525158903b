//! Evaluation algebra
//!
//! Composable boolean predicates and prioritized classification rules over
//! an arbitrary fact.
//!
//! # Architecture
//!
//! - **Predicates**: AND/OR/NOT with short-circuit evaluation
//! - **Rules**: predicate + result + optional priority; validate, filter, sort
//! - **Fold engine**: `init` / `step` / `finalize`, eager or pull-based
//! - **Boundaries**: caller code never unwinds through the algebra
//!
//! # Invariants
//!
//! - Empty inputs and size-limit violations are rejected before any
//!   caller-supplied function runs (eager inputs)
//! - Lazy evaluation never pulls past a halt or a failure
//! - Hooks cannot change an outcome
//! - Debug metadata is attached only in debug mode

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod fold;
pub mod metadata;
pub mod predicate;
pub mod rule;

mod boundary;

// Re-exports
pub use boundary::{isolate, HookResult};
pub use config::{EvalConfig, PriorityBounds, RuleSetConfig};
pub use error::{BoxError, Diagnostic, PredicateFailure, RuleFailure};
pub use fold::{Hooks, NoHooks, Outcome, Step};
pub use metadata::{ErrorMetadata, RawMetadata};
pub use predicate::{Predicate, PredicateOperation, Truthy};
pub use rule::{AllMatches, FirstMatch, RawRule, Rule, RuleOperation};
