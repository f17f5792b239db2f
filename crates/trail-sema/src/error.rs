//! Semantic diagnostics.
//!
//! Passes never abort on a user error: they append a `SemaError` to the
//! shared [`Diagnostics`] sink and leave the offending node in place.
//! Rendering lives in [`crate::diagnostics`].

use std::fmt;

use serde::Serialize;
use trail_common::Span;
use trail_syntax::{Axis, BinOp, Ty};

/// How serious a diagnostic is. Only errors block emission.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A semantic error or warning.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemaError {
    /// No scope could resolve a navigation step.
    UnresolvedStep {
        step: String,
        /// The type in view when the step was attempted; `None` at the head.
        in_view: Option<Ty>,
        span: Span,
    },
    /// A bare name no scope resolved.
    UnresolvedName { name: String, span: Span },
    /// A bare call no scope resolved.
    UnresolvedMethodCall { name: String, arity: usize, span: Span },
    /// A method body's final expression does not convert to the declared
    /// return type.
    ReturnTypeMismatch { method: String, expected: Ty, found: Ty, span: Span },
    /// A method with a primitive declared return type has an empty body.
    MissingReturn { method: String, expected: Ty, span: Span },
    /// A binary expression with typed operands that neither an operator
    /// implementation nor numeric widening accepted.
    UnresolvedOperator { op: BinOp, left: Ty, right: Ty, span: Span },
    /// Two navigators were registered for the same (type, axis, test).
    NavigatorConflict { declaring: Ty, axis: Axis, test: String, kept: String, dropped: String },
}

impl SemaError {
    pub fn severity(&self) -> Severity {
        match self {
            SemaError::NavigatorConflict { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SemaError::UnresolvedStep { .. } => "E0101",
            SemaError::UnresolvedName { .. } => "E0102",
            SemaError::UnresolvedMethodCall { .. } => "E0103",
            SemaError::ReturnTypeMismatch { .. } => "E0104",
            SemaError::MissingReturn { .. } => "E0105",
            SemaError::UnresolvedOperator { .. } => "E0106",
            SemaError::NavigatorConflict { .. } => "W0101",
        }
    }

    /// The source region the diagnostic refers to, if it has one.
    pub fn span(&self) -> Option<&Span> {
        match self {
            SemaError::UnresolvedStep { span, .. }
            | SemaError::UnresolvedName { span, .. }
            | SemaError::UnresolvedMethodCall { span, .. }
            | SemaError::ReturnTypeMismatch { span, .. }
            | SemaError::MissingReturn { span, .. }
            | SemaError::UnresolvedOperator { span, .. } => Some(span),
            SemaError::NavigatorConflict { .. } => None,
        }
    }
}

impl fmt::Display for SemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemaError::UnresolvedStep { step, in_view: Some(ty), .. } => {
                write!(f, "cannot resolve `{}` on {}", step, ty)
            }
            SemaError::UnresolvedStep { step, in_view: None, .. } => {
                write!(f, "cannot resolve `{}`", step)
            }
            SemaError::UnresolvedName { name, .. } => {
                write!(f, "unresolved name `{}`", name)
            }
            SemaError::UnresolvedMethodCall { name, arity, .. } => {
                write!(f, "unresolved method `{}` taking {} argument(s)", name, arity)
            }
            SemaError::ReturnTypeMismatch { method, expected, found, .. } => {
                write!(f, "`{}` returns {}, but its body produces {}", method, expected, found)
            }
            SemaError::MissingReturn { method, expected, .. } => {
                write!(f, "`{}` must return {}, but its body is empty", method, expected)
            }
            SemaError::UnresolvedOperator { op, left, right, .. } => {
                write!(f, "no operator `{}` for {} and {}", op, left, right)
            }
            SemaError::NavigatorConflict { declaring, axis, test, kept, dropped } => {
                write!(
                    f,
                    "navigator `{}` for {}::{} on {} ignored; `{}` was registered first",
                    dropped, axis, test, declaring, kept
                )
            }
        }
    }
}

/// The per-compilation diagnostics sink shared by every pass.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<SemaError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SemaError) {
        self.entries.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = SemaError>) {
        self.entries.extend(errors);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SemaError> {
        self.entries.iter().filter(|e| e.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SemaError> {
        self.entries.iter().filter(|e| e.severity() == Severity::Warning)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemaError> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
