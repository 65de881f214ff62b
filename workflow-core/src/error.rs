//! Error types.
//!
//! Graph queries and mutations fail synchronously with [`GraphError`].
//! Background recomputation failures are reported through `tracing` and
//! never cross into the foreground as errors.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by the task graph, the evaluator and the manager.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The name has no recipe (or no record, depending on the operation).
    #[error("no task named '{0}'")]
    NotFound(String),

    /// Evaluation re-entered a node that is already being resolved.
    #[error("dependency cycle through '{0}'")]
    CycleDetected(String),

    /// The function recorded for a node returned an error.
    #[error("recomputing '{name}' failed: {source}")]
    RecomputeFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Arguments could not be bound against the function's parameters.
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Call-binding failures, raised when a recipe is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("{function}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        function: String,
        expected: usize,
        given: usize,
    },

    #[error("{function}() got an unexpected keyword argument '{param}'")]
    UnexpectedKeyword { function: String, param: String },

    #[error("{function}() got multiple values for argument '{param}'")]
    MultipleValues { function: String, param: String },

    #[error("{function}() missing required argument '{param}'")]
    MissingArgument { function: String, param: String },
}
