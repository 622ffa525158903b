//! Error boundaries around caller-supplied functions
//!
//! Everything a caller hands to the algebra (predicates, steps, finalizers,
//! hooks) runs behind [`guard`]. Both returned errors and panics come back
//! as a [`Fault`]; nothing unwinds through the algebra.

use crate::error::{BoxError, Diagnostic};
use crate::metadata::ErrorMetadata;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

/// Result returned by observability hooks
pub type HookResult = Result<(), BoxError>;

/// Error raised by a caller-supplied function
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fault {
    pub message: String,
    pub stack: Option<String>,
}

impl Fault {
    fn from_error(err: BoxError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\ncaused by: ")),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        Self {
            message: format!("panicked: {}", message),
            stack: None,
        }
    }

    pub(crate) fn into_diagnostic(
        self,
        index: usize,
        metadata: Option<ErrorMetadata>,
    ) -> Diagnostic {
        Diagnostic {
            index,
            message: Some(self.message),
            stack: self.stack,
            metadata,
        }
    }
}

/// Run a caller-supplied function, converting errors and panics into a [`Fault`]
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, Fault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Fault::from_error(err)),
        Err(payload) => Err(Fault::from_panic(payload)),
    }
}

/// Run an observability callback whose outcome must never matter.
///
/// Errors and panics are logged and dropped.
pub fn isolate(label: &str, hook: impl FnOnce() -> HookResult) {
    if let Err(fault) = guard(hook) {
        warn!(hook = label, error = %fault.message, "hook failed, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "outer failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "inner cause")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    impl std::error::Error for Inner {}

    #[test]
    fn test_guard_passes_values_through() {
        assert_eq!(guard(|| Ok(7)), Ok(7));
    }

    #[test]
    fn test_guard_records_source_chain() {
        let fault = guard::<()>(|| Err(Box::new(Outer(Inner)) as BoxError)).unwrap_err();
        assert_eq!(fault.message, "outer failed");
        assert_eq!(fault.stack.as_deref(), Some("inner cause"));
    }

    #[test]
    fn test_guard_catches_panics() {
        let fault = guard::<()>(|| panic!("boom")).unwrap_err();
        assert_eq!(fault.message, "panicked: boom");
    }

    #[test]
    fn test_isolate_swallows_everything() {
        isolate("err", || Err("hook error".into()));
        isolate("panic", || panic!("hook panic"));
    }
}
