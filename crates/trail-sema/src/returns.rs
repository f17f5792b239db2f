//! Implicit-return checking.
//!
//! A method body evaluates to its last expression. When the method declares
//! a return type, that value must convert to it by identity, a null
//! reference, numeric widening, boxing, unboxing or subtyping. Widening,
//! boxing and unboxing are made explicit with a conversion node.
//!
//! An empty body is a missing return only for primitive return types; a
//! reference-typed method with no body returns `null`.

use tracing::debug;
use trail_common::error::Result;
use trail_syntax::{Conversion, MethodDecl, Node, NodeKind, NumKind, Ty};

use crate::error::SemaError;
use crate::pass::{Context, Pass};
use crate::types::TypeInfo;
use crate::widening::promote;

pub struct ReturnChecker;

impl Pass for ReturnChecker {
    fn name(&self) -> &'static str {
        "returns"
    }

    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node> {
        rewrite(root, cx)
    }
}

fn rewrite(node: Node, cx: &mut Context<'_>) -> Result<Node> {
    let mut node = node.map_children(|c| rewrite(c, cx))?;
    let span = node.span.clone();
    if let NodeKind::MethodDecl(decl) = &mut node.kind {
        check_method(decl, span, cx);
    }
    Ok(node)
}

fn check_method(decl: &mut MethodDecl, span: trail_common::Span, cx: &mut Context<'_>) {
    let Some(expected) = decl.return_ty.clone().filter(|ty| !ty.is_void()) else {
        return;
    };
    let Some(last) = decl.body.pop() else {
        if expected.is_primitive() {
            cx.diagnostics.push(SemaError::MissingReturn { method: decl.name.clone(), expected, span });
        } else {
            decl.body.push(Node::null(expected).at(span));
        }
        return;
    };
    let Some(found) = last.ty.clone() else {
        // Already reported by whichever pass left it untyped.
        decl.body.push(last);
        return;
    };
    match convert(last, &found, &expected, cx.types) {
        Ok(converted) => decl.body.push(converted),
        Err(last) => {
            debug!(method = %decl.name, %expected, %found, "body does not convert to the declared return type");
            cx.diagnostics.push(SemaError::ReturnTypeMismatch {
                method: decl.name.clone(),
                expected,
                found,
                span: last.span.clone(),
            });
            decl.body.push(last);
        }
    }
}

/// Convert `value` of type `found` to `expected`, or hand it back when no
/// implicit conversion applies.
fn convert(value: Node, found: &Ty, expected: &Ty, types: &dyn TypeInfo) -> std::result::Result<Node, Node> {
    if found == expected || (*found == Ty::Null && expected.is_reference()) {
        return Ok(value);
    }

    // Unbox first so `Integer` returns into `long` as well as `int`.
    let (value, found) = match found.unboxed() {
        Some(prim) if expected.is_primitive() => (Node::convert(Conversion::Unbox, value, prim.clone()), prim),
        _ => (value, found.clone()),
    };
    if found == *expected {
        return Ok(value);
    }
    if let (Some(fk), Some(ek)) = (NumKind::of(&found), NumKind::of(expected)) {
        return if promote(fk, ek) == ek {
            Ok(Node::convert(Conversion::Widen, value, expected.clone()))
        } else {
            Err(strip_unbox(value))
        };
    }
    if found.is_primitive() && expected.is_reference() {
        let boxed = found.boxed();
        return if types.is_subtype(&boxed, expected) {
            Ok(Node::convert(Conversion::Box, value, boxed))
        } else {
            Err(value)
        };
    }
    if types.is_subtype(&found, expected) {
        Ok(value)
    } else {
        Err(strip_unbox(value))
    }
}

/// Undo a speculative unbox so a rejected value is reported as written.
fn strip_unbox(node: Node) -> Node {
    match node.kind {
        NodeKind::Convert { conversion: Conversion::Unbox, expr } => *expr,
        kind => Node { kind, ..node },
    }
}
