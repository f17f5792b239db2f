//! Numeric widening.
//!
//! Binary expressions whose operands are both numeric are brought to a
//! common kind taken from the promotion table. Pairs of literals are
//! converted at compile time and, for arithmetic, folded into a single
//! literal; everything else gets explicit conversion nodes. Boxed numeric
//! operands are unboxed first.
//!
//! The pass also assigns the types the earlier passes leave open: logical
//! and comparison operators are boolean, and a front-end conditional takes
//! the common type of its branches.

use trail_common::error::Result;
use trail_syntax::{BinOp, Conversion, Literal, Node, NodeKind, NumKind, Ty};

use crate::pass::{Context, Pass};
use crate::types::TypeInfo;

/// The promoted kind of an unordered pair of numeric kinds.
///
/// Integer widths promote to the wider width; a float operand pulls an
/// integer up to that float; an arbitrary-precision operand pulls its
/// partner into the arbitrary kind of the same family, and a mix of the
/// arbitrary integer with a float lands on the arbitrary decimal.
pub fn promote(a: NumKind, b: NumKind) -> NumKind {
    use NumKind::*;

    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    match (lo, hi) {
        _ if lo == hi => lo,
        (_, BigDecimal) => BigDecimal,
        (BigInteger, Float | Double) => BigDecimal,
        (Short | Int | Long, wider) => wider,
        (Float, Double) => Double,
        // `lo < hi` leaves no other ordered pair.
        _ => hi,
    }
}

/// The widening pass.
pub struct NumericWidening;

impl Pass for NumericWidening {
    fn name(&self) -> &'static str {
        "widening"
    }

    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node> {
        rewrite(root, cx)
    }
}

fn rewrite(node: Node, cx: &mut Context<'_>) -> Result<Node> {
    let node = node.map_children(|c| rewrite(c, cx))?;
    Ok(match &node.kind {
        NodeKind::Binary { .. } => widen_binary(node, cx.config.fold_literals),
        NodeKind::Conditional { .. } if node.ty.is_none() => type_conditional(node, cx.types),
        _ => node,
    })
}

/// The lattice kind of an operand, looking through boxing.
pub(crate) fn operand_kind(ty: &Ty) -> Option<NumKind> {
    NumKind::of(ty).or_else(|| ty.unboxed().as_ref().and_then(NumKind::of))
}

fn widen_binary(node: Node, fold_literals: bool) -> Node {
    let Node { span, ty, kind } = node;
    let (op, lhs, rhs) = match kind {
        NodeKind::Binary { op, lhs, rhs } => (op, *lhs, *rhs),
        kind => return Node { span, ty, kind },
    };
    let rebuild = |lhs: Node, rhs: Node, ty: Option<Ty>| Node {
        span: span.clone(),
        ty,
        kind: NodeKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
    };

    if op.is_logical() {
        return rebuild(lhs, rhs, Some(Ty::boolean()));
    }
    if !(op.is_arithmetic() || op.is_comparison()) {
        return rebuild(lhs, rhs, ty);
    }
    let (Some(lt), Some(rt)) = (lhs.ty.clone(), rhs.ty.clone()) else {
        return rebuild(lhs, rhs, ty);
    };
    let (Some(lk), Some(rk)) = (operand_kind(&lt), operand_kind(&rt)) else {
        // Two primitives of the same non-numeric kind still compare.
        let ty = if op.is_comparison() && lt == rt && lt.is_primitive() { Some(Ty::boolean()) } else { ty };
        return rebuild(lhs, rhs, ty);
    };

    let kind = promote(lk, rk);
    let result_ty = if op.is_comparison() { Ty::boolean() } else { kind.ty() };

    if fold_literals {
        if let (NodeKind::Literal(l), NodeKind::Literal(r)) = (&lhs.kind, &rhs.kind) {
            if let (Some(l), Some(r)) = (l.widen_to(kind), r.widen_to(kind)) {
                if op.is_arithmetic() {
                    if let Some(folded) = fold(op, &l, &r) {
                        return Node::literal(folded).at(span.clone());
                    }
                }
                let lhs = Node::literal(l).at(lhs.span);
                let rhs = Node::literal(r).at(rhs.span);
                return rebuild(lhs, rhs, Some(result_ty));
            }
        }
    }

    rebuild(coerce(lhs, kind), coerce(rhs, kind), Some(result_ty))
}

/// Unbox and widen `node` to `kind`. Nodes already of that kind are
/// returned as they are.
fn coerce(node: Node, kind: NumKind) -> Node {
    let node = match node.ty.as_ref().and_then(Ty::unboxed) {
        Some(prim) if NumKind::of(&prim).is_some() => Node::convert(Conversion::Unbox, node, prim),
        _ => node,
    };
    match node.ty.as_ref().and_then(NumKind::of) {
        Some(k) if k != kind => Node::convert(Conversion::Widen, node, kind.ty()),
        _ => node,
    }
}

macro_rules! checked_int {
    ($op:expr, $a:expr, $b:expr) => {
        match $op {
            BinOp::Add => $a.checked_add($b),
            BinOp::Sub => $a.checked_sub($b),
            BinOp::Mul => $a.checked_mul($b),
            BinOp::Div => $a.checked_div($b),
            BinOp::Rem => $a.checked_rem($b),
            _ => None,
        }
    };
}

macro_rules! ieee {
    ($op:expr, $a:expr, $b:expr) => {
        match $op {
            BinOp::Add => Some($a + $b),
            BinOp::Sub => Some($a - $b),
            BinOp::Mul => Some($a * $b),
            BinOp::Div => Some($a / $b),
            BinOp::Rem => Some($a % $b),
            _ => None,
        }
    };
}

/// Evaluate arithmetic over two literals of the same kind.
///
/// Integer overflow and division by zero are not folded, so the runtime
/// reports them. Arbitrary decimals are never folded.
pub fn fold(op: BinOp, l: &Literal, r: &Literal) -> Option<Literal> {
    match (l, r) {
        (Literal::Short(a), Literal::Short(b)) => checked_int!(op, *a, *b).map(Literal::Short),
        (Literal::Int(a), Literal::Int(b)) => checked_int!(op, *a, *b).map(Literal::Int),
        (Literal::Long(a), Literal::Long(b)) => checked_int!(op, *a, *b).map(Literal::Long),
        (Literal::BigInteger(a), Literal::BigInteger(b)) => {
            checked_int!(op, *a, *b).map(Literal::BigInteger)
        }
        (Literal::Float(a), Literal::Float(b)) => ieee!(op, *a, *b).map(Literal::Float),
        (Literal::Double(a), Literal::Double(b)) => ieee!(op, *a, *b).map(Literal::Double),
        _ => None,
    }
}

fn type_conditional(node: Node, types: &dyn TypeInfo) -> Node {
    let Node { span, ty, kind } = node;
    let (cond, then_branch, else_branch) = match kind {
        NodeKind::Conditional { cond, then_branch, else_branch } => (cond, *then_branch, *else_branch),
        kind => return Node { span, ty, kind },
    };
    let build = |then_branch: Node, else_branch: Node, ty: Option<Ty>| Node {
        span: span.clone(),
        ty,
        kind: NodeKind::Conditional {
            cond: cond.clone(),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        },
    };
    let (Some(t), Some(e)) = (then_branch.ty.clone(), else_branch.ty.clone()) else {
        return build(then_branch, else_branch, ty);
    };

    if t == e {
        return build(then_branch, else_branch, Some(t));
    }
    if let (Some(tk), Some(ek)) = (NumKind::of(&t), NumKind::of(&e)) {
        let kind = promote(tk, ek);
        return build(coerce(then_branch, kind), coerce(else_branch, kind), Some(kind.ty()));
    }
    let common = match (&t, &e) {
        (Ty::Null, other) | (other, Ty::Null) => other.boxed(),
        _ if types.is_subtype(&t.boxed(), &e.boxed()) => e.boxed(),
        _ if types.is_subtype(&e.boxed(), &t.boxed()) => t.boxed(),
        _ => Ty::object(),
    };
    build(box_to(then_branch, &common), box_to(else_branch, &common), Some(common))
}

fn box_to(node: Node, target: &Ty) -> Node {
    match &node.ty {
        Some(ty) if ty.is_primitive() && target.is_reference() => {
            let boxed = ty.boxed();
            Node::convert(Conversion::Box, node, boxed)
        }
        _ => node,
    }
}
