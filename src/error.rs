//! Errors produced while describing and composing kernels.
use thiserror::Error;

/// A matrix shape as `(rows, columns)`.
pub type Shape = (usize, usize);

/// Errors that abort a kernel generation run.
///
/// None of these are recoverable: the kernel library is consumed as a whole by the
/// backend, so a partially assembled library is of no use.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("shape mismatch in {operation}: `{left}` has shape {left_shape:?} but `{right}` has shape {right_shape:?}")]
    ShapeMismatch {
        operation: &'static str,
        left: String,
        left_shape: Shape,
        right: String,
        right_shape: Shape,
    },

    #[error("duplicate {kind} name `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    #[error("`{name}` is referenced by {referenced_by} but is not present in the matrix registry")]
    UnresolvedReference { name: String, referenced_by: String },

    #[error("kernel `{kernel}` prefetches `{target}`, which is neither a registered matrix nor an earlier kernel")]
    UnknownPrefetchTarget { kernel: String, target: String },

    #[error("matrices `{first}` (rule {first_rule}) and `{second}` (rule {second_rule}) both resolve to global id {id}")]
    IdentifierCollision {
        id: usize,
        first: String,
        first_rule: usize,
        second: String,
        second_rule: usize,
    },

    #[error("matrix `{name}` matches global id rule {rule} but carries no global id")]
    UnresolvedGlobalId { name: String, rule: usize },

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("invalid sparsity pattern for matrix `{name}`: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("invalid memory layout for matrix `{name}`: {reason}")]
    InvalidLayout { name: String, reason: String },

    #[error("invalid global id rule pattern `{pattern}`: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("global id rule {rule} (`{pattern}`) cannot compute an id for `{name}` from captures {captures:?}")]
    RuleEvaluation {
        rule: usize,
        pattern: String,
        name: String,
        captures: Vec<String>,
    },

    #[error("unknown architecture identifier `{0}`")]
    UnknownArchitecture(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
