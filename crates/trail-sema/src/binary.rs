//! Operator resolution.
//!
//! Post-order: operands are resolved before the binary expression holding
//! them. A binary expression whose operand types match a registered
//! operator implementation becomes an operator call; anything else is left
//! alone for numeric widening or the late reporters. Primitive operands are
//! boxed when the implementation expects references. Arithmetic and
//! comparisons between two numeric operands, boxed or not, always belong
//! to numeric widening.

use tracing::trace;
use trail_common::error::Result;
use trail_syntax::{BinOp, Conversion, Node, NodeKind, Ty};

use crate::pass::{Context, Pass};
use crate::widening::operand_kind;

/// The operator-resolution pass.
pub struct OperatorResolver;

impl Pass for OperatorResolver {
    fn name(&self) -> &'static str {
        "operators"
    }

    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node> {
        rewrite(root, cx)
    }
}

fn rewrite(node: Node, cx: &mut Context<'_>) -> Result<Node> {
    let node = node.map_children(|c| rewrite(c, cx))?;
    match node.kind {
        NodeKind::Binary { .. } => Ok(resolve_binary(node, cx)),
        _ => Ok(node),
    }
}

fn resolve_binary(node: Node, cx: &Context<'_>) -> Node {
    let Node { span, ty, kind } = node;
    let (op, lhs, rhs) = match kind {
        NodeKind::Binary { op, lhs, rhs } => (op, *lhs, *rhs),
        kind => return Node { span, ty, kind },
    };
    let unchanged = |lhs: Node, rhs: Node| Node {
        span: span.clone(),
        ty: ty.clone(),
        kind: NodeKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
    };
    let (left, right) = match (&lhs.ty, &rhs.ty) {
        (Some(l), Some(r)) => (l.clone(), r.clone()),
        // Deferred until both sides are known.
        _ => return unchanged(lhs, rhs),
    };
    let numeric = operand_kind(&left).is_some() && operand_kind(&right).is_some();
    if numeric && (op.is_arithmetic() || op.is_comparison()) {
        return unchanged(lhs, rhs);
    }

    // Elvis and type tests work on references, and so does any operator
    // mixing a primitive with a reference. Purely primitive pairs are left
    // to numeric widening.
    let boxing = matches!(op, BinOp::Elvis | BinOp::InstanceOf)
        || left.is_primitive() != right.is_primitive();
    let left = if boxing { left.boxed() } else { left };
    let right = match op {
        BinOp::InstanceOf => Ty::class(),
        _ if boxing => right.boxed(),
        _ => right,
    };

    let Some(imp) = cx.operators.lookup(op, &left, &right, cx.types) else {
        return unchanged(lhs, rhs);
    };
    trace!(%op, %left, %right, operator = format_args!("{}.{}", imp.owner, imp.method), "operator resolved");
    let (lhs, rhs) = if boxing { (box_primitive(lhs), box_primitive(rhs)) } else { (lhs, rhs) };
    Node::new(NodeKind::OperatorCall {
        owner: imp.owner.clone(),
        method: imp.method.clone(),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
    .at(span.clone())
    .typed(imp.return_ty(&left))
}

fn box_primitive(node: Node) -> Node {
    match &node.ty {
        Some(ty) if ty.is_primitive() => {
            let boxed = ty.boxed();
            Node::convert(Conversion::Box, node, boxed)
        }
        _ => node,
    }
}
