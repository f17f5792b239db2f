//! Syntax tree and type model for Trail, the navigation expression language.
//!
//! The front end produces a [`Node`] tree; the semantic passes in
//! `trail-sema` rewrite it in place into resolved forms that a code
//! generator can emit directly.

pub mod ast;
pub mod display;
pub mod ty;

pub use ast::{
    Axis, BinOp, Conversion, Instr, Literal, MethodDecl, NavStep, Node, NodeKind, NodeTest,
    Param, PipeOp, Reduction,
};
pub use ty::{NumKind, PrimKind, Ty, TyCon};
