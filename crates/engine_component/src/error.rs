//! Component-layer error types.

use engine_instance::{EntityError, VariantKind};

/// Errors returned by component operations.
///
/// Usage errors are raised at the call site; nothing is deferred into
/// cleanup. Disposal failures never surface here; they are collected in a
/// [`CleanupReport`](crate::CleanupReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The task does not support the requested cleanup method.
    #[error("task does not support cleanup method `{method}`")]
    UnknownCleanupMethod { method: String },

    /// The task has no canonical cleanup method and none was given.
    #[error("task has no default cleanup method; pass one explicitly")]
    NoCleanupMethod,

    /// A signal name was reused with a different argument type.
    #[error("signal `{name}` already exists with an argument type other than {requested}")]
    SignalTypeMismatch {
        name: String,
        requested: &'static str,
    },

    /// An attribute holds a value of the wrong kind for the operation.
    #[error("attribute `{name}` holds a {found}, expected a {expected}")]
    AttributeTypeMismatch {
        name: String,
        expected: VariantKind,
        found: VariantKind,
    },

    /// An attribute's value is outside the accepted kinds.
    #[error("attribute `{name}` holds a {found}, accepted kinds are {expected:?}")]
    InvalidAttributeKind {
        name: String,
        found: VariantKind,
        expected: Vec<VariantKind>,
    },

    /// The component has been stopped; the operation did nothing.
    #[error("{operation} ignored: component `{tag}` is destroyed")]
    Destroyed {
        tag: String,
        operation: &'static str,
    },

    /// The underlying entity rejected the operation.
    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl ComponentError {
    /// Returns `true` for programmer errors that should be fixed at the
    /// call site rather than handled at runtime.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ComponentError::UnknownCleanupMethod { .. }
                | ComponentError::NoCleanupMethod
                | ComponentError::SignalTypeMismatch { .. }
                | ComponentError::AttributeTypeMismatch { .. }
                | ComponentError::InvalidAttributeKind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_classification() {
        assert!(ComponentError::NoCleanupMethod.is_usage_error());
        let stale = ComponentError::Destroyed {
            tag: "Door".to_string(),
            operation: "add_task",
        };
        assert!(!stale.is_usage_error());
        assert_eq!(stale.to_string(), "add_task ignored: component `Door` is destroyed");
    }

    #[test]
    fn test_kind_errors_render_engine_names() {
        let err = ComponentError::AttributeTypeMismatch {
            name: "Count".to_string(),
            expected: VariantKind::Number,
            found: VariantKind::String,
        };
        assert_eq!(
            err.to_string(),
            "attribute `Count` holds a string, expected a number"
        );
    }
}
