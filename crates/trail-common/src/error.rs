//! Internal invariant failures.
//!
//! These are not user diagnostics. A pass that observes a structurally
//! impossible tree stops immediately and returns one of these; the pipeline
//! never publishes a partially rewritten tree.

use thiserror::Error;

/// Result alias for pass-internal operations.
pub type Result<T> = std::result::Result<T, InternalError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    /// A composite node was rebuilt with a different number of children
    /// than it enumerated.
    #[error("node `{node}` expected {expected} children, found {found}")]
    ChildCountMismatch {
        node: &'static str,
        expected: usize,
        found: usize,
    },

    /// A navigation stream with no steps reached the resolver.
    #[error("empty navigation stream at {0}")]
    EmptyStream(String),

    /// A scope was popped from an empty scope chain.
    #[error("scope chain underflow")]
    ScopeUnderflow,

    /// A navigator returned a replacement without a resolved type.
    #[error("navigator for step `{step}` produced an untyped node")]
    UntypedReplacement { step: String },

    /// A chain link that must produce a typed value did not.
    #[error("`{node}` has no resolved type")]
    Untyped { node: &'static str },

    /// Stream lowering was asked to iterate a single-valued type.
    #[error("`{0}` is not multi-valued")]
    NotMultiValued(String),

    /// A reduction link appeared outside a stream context.
    #[error("reduction outside a stream context")]
    ReductionOutsideStream,
}
