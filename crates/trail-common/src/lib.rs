//! Shared types for the Trail compiler.
//!
//! - [`span`]: source positions attached to every syntax node
//! - [`error`]: internal invariant failures raised by the semantic passes

pub mod error;
pub mod span;

pub use error::InternalError;
pub use span::{Position, Span};
