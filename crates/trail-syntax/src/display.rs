//! Single-line s-expression rendering of syntax trees.
//!
//! Used by `trailc --print-tree` and by snapshot tests. The format is stable:
//! leaves print bare (`this`, `_`, `x`, `1L`), composites print as
//! `(head child ...)`. Types are not printed; use [`typed`] for that.

use std::fmt::{self, Write};

use crate::ast::{Instr, Literal, Node, NodeKind};

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_node(f, self, false)
    }
}

/// Render `node` with every typed node suffixed by `:type`.
pub fn typed(node: &Node) -> String {
    let mut out = String::new();
    let _ = write_node(&mut out, node, true);
    out
}

fn write_list<W: Write>(out: &mut W, nodes: &[Node], types: bool) -> fmt::Result {
    for node in nodes {
        out.write_char(' ')?;
        write_node(out, node, types)?;
    }
    Ok(())
}

fn write_node<W: Write>(out: &mut W, node: &Node, types: bool) -> fmt::Result {
    match &node.kind {
        NodeKind::Script(items) => {
            out.write_str("(script")?;
            write_list(out, items, types)?;
            out.write_char(')')?;
        }
        NodeKind::Literal(Literal::Null) => out.write_str("null")?,
        NodeKind::Literal(lit) => write!(out, "{}", lit)?,
        NodeKind::Name(name) => write!(out, "(name {})", name)?,
        NodeKind::Call { name, args } => {
            write!(out, "(call {}", name)?;
            write_list(out, args, types)?;
            out.write_char(')')?;
        }
        NodeKind::Stream(steps) => {
            out.write_str("(stream")?;
            for step in steps {
                write!(out, " {}", step)?;
            }
            out.write_char(')')?;
        }
        NodeKind::Binary { op, lhs, rhs } => {
            write!(out, "({} ", op)?;
            write_node(out, lhs, types)?;
            out.write_char(' ')?;
            write_node(out, rhs, types)?;
            out.write_char(')')?;
        }
        NodeKind::Conditional { cond, then_branch, else_branch } => {
            out.write_str("(if ")?;
            write_node(out, cond, types)?;
            out.write_char(' ')?;
            write_node(out, then_branch, types)?;
            out.write_char(' ')?;
            write_node(out, else_branch, types)?;
            out.write_char(')')?;
        }
        NodeKind::MethodDecl(decl) => {
            write!(out, "(method {} (", decl.name)?;
            for (i, p) in decl.params.iter().enumerate() {
                if i > 0 {
                    out.write_char(' ')?;
                }
                write!(out, "{}:{}", p.name, p.ty)?;
            }
            out.write_char(')')?;
            if let Some(ret) = &decl.return_ty {
                write!(out, " -> {}", ret)?;
            }
            write_list(out, &decl.body, types)?;
            out.write_char(')')?;
        }
        NodeKind::LocalDecl { name, value, .. } => {
            write!(out, "(local {} ", name)?;
            write_node(out, value, types)?;
            out.write_char(')')?;
        }
        NodeKind::This => out.write_str("this")?,
        NodeKind::Stacked => out.write_char('_')?,
        NodeKind::LocalRef(name) => out.write_str(name)?,
        NodeKind::TypeRef(ty) => write!(out, "(type {})", ty)?,
        NodeKind::PropertyRead { target, name } => {
            out.write_str("(. ")?;
            write_node(out, target, types)?;
            write!(out, " {})", name)?;
        }
        NodeKind::MethodCall { target, owner, name, args } => {
            out.write_str("(invoke ")?;
            write_node(out, target, types)?;
            write!(out, " {}.{}", owner, name)?;
            write_list(out, args, types)?;
            out.write_char(')')?;
        }
        NodeKind::OperatorCall { owner, method, lhs, rhs } => {
            write!(out, "(op {}.{} ", owner, method)?;
            write_node(out, lhs, types)?;
            out.write_char(' ')?;
            write_node(out, rhs, types)?;
            out.write_char(')')?;
        }
        NodeKind::Convert { conversion, expr } => {
            write!(out, "({} {} ", conversion.name(), node.ty_name())?;
            write_node(out, expr, types)?;
            // The target type is already in the head.
            return out.write_char(')');
        }
        NodeKind::ToSequence(expr) => {
            out.write_str("(seq ")?;
            write_node(out, expr, types)?;
            out.write_char(')')?;
        }
        NodeKind::Pipe { op, source, param, body } => {
            write!(out, "({} ", op.name())?;
            write_node(out, source, types)?;
            write!(out, " |{}| ", param)?;
            write_node(out, body, types)?;
            out.write_char(')')?;
        }
        NodeKind::Collect { source, into } => {
            write!(out, "(collect {} ", into.notation())?;
            write_node(out, source, types)?;
            out.write_char(')')?;
        }
        NodeKind::Let { name, value, body } => {
            write!(out, "(let {} ", name)?;
            write_node(out, value, types)?;
            out.write_char(' ')?;
            write_node(out, body, types)?;
            out.write_char(')')?;
        }
        NodeKind::IsNull(expr) => {
            out.write_str("(null? ")?;
            write_node(out, expr, types)?;
            out.write_char(')')?;
        }
        NodeKind::Sequence(items) => {
            out.write_str("(do")?;
            write_list(out, items, types)?;
            out.write_char(')')?;
        }
        NodeKind::Instr(Instr::Dup) => out.write_str("dup")?,
        NodeKind::Instr(Instr::Pop) => out.write_str("pop")?,
    }
    if types {
        if let Some(ty) = &node.ty {
            write!(out, ":{}", ty)?;
        }
    }
    Ok(())
}
