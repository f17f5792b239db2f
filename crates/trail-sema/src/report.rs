//! Late reporting of unresolved bare names, calls and operators.
//!
//! Navigation resolution leaves a bare name or call in place when no scope
//! claims it, because a later pass may still give it meaning. Whatever is
//! left when the pipeline reaches this pass is reported here, once per
//! node. Streams are skipped: an abandoned stream has already been
//! reported at the step that failed.
//!
//! A binary expression still untyped here found neither an operator nor a
//! numeric promotion. It is reported only when both operands are typed;
//! an untyped operand carries its own diagnostic.

use trail_common::error::Result;
use trail_syntax::{Node, NodeKind};

use crate::error::SemaError;
use crate::pass::{Context, Pass};

pub struct UnresolvedReporter;

impl Pass for UnresolvedReporter {
    fn name(&self) -> &'static str {
        "unresolved"
    }

    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node> {
        report(&root, cx);
        Ok(root)
    }
}

fn report(node: &Node, cx: &mut Context<'_>) {
    match &node.kind {
        NodeKind::Stream(_) => return,
        NodeKind::Name(name) => cx.diagnostics.push(SemaError::UnresolvedName {
            name: name.clone(),
            span: node.span.clone(),
        }),
        NodeKind::Call { name, args } => cx.diagnostics.push(SemaError::UnresolvedMethodCall {
            name: name.clone(),
            arity: args.len(),
            span: node.span.clone(),
        }),
        NodeKind::Binary { op, lhs, rhs } if node.ty.is_none() => {
            if let (Some(left), Some(right)) = (&lhs.ty, &rhs.ty) {
                cx.diagnostics.push(SemaError::UnresolvedOperator {
                    op: *op,
                    left: left.clone(),
                    right: right.clone(),
                    span: node.span.clone(),
                });
            }
        }
        _ => {}
    }
    for child in node.children() {
        report(child, cx);
    }
}
