//! Error types for dependency injection

use crate::lifecycle::{LifecycleOperation, LifecycleState};
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by user-supplied construction and lifecycle closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a wrapped failure, so `DiError` stays `Clone`.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during dependency injection operations
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// Nothing is registered under the requested key
    #[error("Component not found: {key}")]
    NotFound { key: String },

    /// Registering a key that is already present in the same container
    #[error("Duplicate key: {key} is already registered in this container")]
    DuplicateKey { key: String },

    /// The implementation type cannot be instantiated
    #[error("{type_name} is not a concrete type and cannot be instantiated")]
    NotConcreteType { type_name: &'static str },

    /// A required injection point could not be resolved
    #[error("{type_name} has unsatisfied dependencies: {}", .unresolved.join(", "))]
    UnsatisfiedDependency {
        type_name: &'static str,
        unresolved: Vec<String>,
    },

    /// More than one candidate satisfies a parameter and nothing disambiguates them
    #[error("Ambiguous resolution of {requested}: candidates are {}", .candidates.join(", "))]
    AmbiguousResolution {
        requested: &'static str,
        candidates: Vec<&'static str>,
    },

    /// Re-entrant resolution of one implementation type within a single resolution
    #[error("Cyclic dependency: {}", .chain.join(" <- "))]
    CyclicDependency {
        /// Visited implementation types, innermost first
        chain: Vec<&'static str>,
    },

    /// Two constructors of the same greatest arity are both satisfiable
    #[error("{type_name} has {count} satisfiable constructors taking {arity} parameters")]
    TooManySatisfiableConstructors {
        type_name: &'static str,
        arity: usize,
        count: usize,
    },

    /// A lifecycle transition was attempted from an invalid state
    #[error("Cannot {operation} {subject} while it is {state}")]
    IllegalLifecycleState {
        subject: String,
        operation: LifecycleOperation,
        state: LifecycleState,
    },

    /// The construction closure of a component failed
    #[error("Failed to instantiate {type_name}: {source}")]
    InstantiationFailed {
        type_name: &'static str,
        #[source]
        source: SharedError,
    },

    /// Assigning an injection member failed
    #[error("Failed to inject {member} of {type_name}: {source}")]
    InvocationFailed {
        type_name: &'static str,
        member: String,
        #[source]
        source: SharedError,
    },

    /// A start, stop or dispose hook failed
    #[error("Failed to {operation} {type_name}: {source}")]
    LifecycleFailed {
        type_name: &'static str,
        operation: LifecycleOperation,
        #[source]
        source: SharedError,
    },

    /// A type key names a type the implementation does not provide
    #[error("Key {key} is not assignable from implementation {type_name}")]
    IncompatibleKey { key: String, type_name: &'static str },

    /// A resolved instance did not have the requested type
    #[error("Component {key} cannot be viewed as {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Verification found problems in the component graph
    #[error("Verification failed with {} error(s): {}", .errors.len(), render(.errors))]
    Verification { errors: Vec<DiError> },

    /// The registration itself is invalid
    #[error("Invalid composition: {0}")]
    Composition(String),
}

fn render(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DiError {
    /// Create a NotFound error for a type
    #[inline]
    pub fn not_found<T: ?Sized + 'static>() -> Self {
        Self::NotFound {
            key: std::any::type_name::<T>().to_string(),
        }
    }

    /// Create an InstantiationFailed error, unless the failure already is a `DiError`
    pub fn instantiation(type_name: &'static str, error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(inner) => *inner,
            Err(error) => Self::InstantiationFailed {
                type_name,
                source: Arc::from(error),
            },
        }
    }

    /// Create an InvocationFailed error, unless the failure already is a `DiError`
    pub fn invocation(type_name: &'static str, member: impl Into<String>, error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(inner) => *inner,
            Err(error) => Self::InvocationFailed {
                type_name,
                member: member.into(),
                source: Arc::from(error),
            },
        }
    }

    /// Create a LifecycleFailed error, unless the failure already is a `DiError`
    pub fn lifecycle(type_name: &'static str, operation: LifecycleOperation, error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(inner) => *inner,
            Err(error) => Self::LifecycleFailed {
                type_name,
                operation,
                source: Arc::from(error),
            },
        }
    }

    /// Create a Composition error
    #[inline]
    pub fn composition(reason: impl Into<String>) -> Self {
        Self::Composition(reason.into())
    }

    /// Whether this is a cyclic dependency error
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }

    /// Whether this is an unsatisfied dependency error
    pub fn is_unsatisfied(&self) -> bool {
        matches!(self, Self::UnsatisfiedDependency { .. })
    }

    /// Whether this is an ambiguous resolution error
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousResolution { .. })
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_instantiation_wraps_foreign_errors() {
        let err = DiError::instantiation("app::Service", Box::new(Boom));
        match &err {
            DiError::InstantiationFailed { type_name, source } => {
                assert_eq!(*type_name, "app::Service");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_instantiation_passes_di_errors_through() {
        let inner = DiError::CyclicDependency {
            chain: vec!["A", "B", "A"],
        };
        let err = DiError::instantiation("A", Box::new(inner));
        assert!(err.is_cyclic());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = DiError::AmbiguousResolution {
            requested: "dyn Color",
            candidates: vec!["Red", "Green"],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous resolution of dyn Color: candidates are Red, Green"
        );

        let err = DiError::UnsatisfiedDependency {
            type_name: "Service",
            unresolved: vec!["logger: Logger".into()],
        };
        assert!(err.to_string().contains("logger: Logger"));
    }
}
