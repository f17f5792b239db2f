//! The Trail syntax tree.
//!
//! A single closed `NodeKind` enum covers both what the front end produces
//! (streams, bare names, binary expressions, ...) and what the semantic
//! passes rewrite it into (property reads, stream combinators, operator
//! calls, conversions, instruction requests). Every pass is a function
//! `Node -> Node`; unchanged subtrees are moved, not copied.

use std::fmt;

use serde::{Deserialize, Serialize};
use trail_common::error::{InternalError, Result};
use trail_common::Span;

use crate::ty::{NumKind, Ty};

// ── Literals ───────────────────────────────────────────────────────────

/// A compile-time constant.
///
/// Arbitrary-precision integers are carried as `i128`; arbitrary-precision
/// decimals keep their canonical decimal text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    BigInteger(i128),
    Float(f32),
    Double(f64),
    BigDecimal(String),
    String(String),
}

impl Literal {
    /// The natural type of the constant.
    pub fn ty(&self) -> Ty {
        match self {
            Literal::Null => Ty::Null,
            Literal::Bool(_) => Ty::boolean(),
            Literal::Char(_) => Ty::Prim(crate::ty::PrimKind::Char),
            Literal::String(_) => Ty::string(),
            other => other
                .num_kind()
                .map(NumKind::ty)
                .unwrap_or_else(Ty::object),
        }
    }

    pub fn num_kind(&self) -> Option<NumKind> {
        Some(match self {
            Literal::Short(_) => NumKind::Short,
            Literal::Int(_) => NumKind::Int,
            Literal::Long(_) => NumKind::Long,
            Literal::BigInteger(_) => NumKind::BigInteger,
            Literal::Float(_) => NumKind::Float,
            Literal::Double(_) => NumKind::Double,
            Literal::BigDecimal(_) => NumKind::BigDecimal,
            _ => return None,
        })
    }

    /// Convert a numeric constant to a wider kind of the lattice.
    ///
    /// Returns `None` for non-numeric constants and for narrowing requests.
    pub fn widen_to(&self, kind: NumKind) -> Option<Literal> {
        let from = self.num_kind()?;
        if from == kind {
            return Some(self.clone());
        }
        let lit = match (self, kind) {
            (Literal::Short(v), NumKind::Int) => Literal::Int(i32::from(*v)),
            (Literal::Short(v), NumKind::Long) => Literal::Long(i64::from(*v)),
            (Literal::Short(v), NumKind::BigInteger) => Literal::BigInteger(i128::from(*v)),
            (Literal::Short(v), NumKind::Float) => Literal::Float(f32::from(*v)),
            (Literal::Short(v), NumKind::Double) => Literal::Double(f64::from(*v)),
            (Literal::Int(v), NumKind::Long) => Literal::Long(i64::from(*v)),
            (Literal::Int(v), NumKind::BigInteger) => Literal::BigInteger(i128::from(*v)),
            (Literal::Int(v), NumKind::Float) => Literal::Float(*v as f32),
            (Literal::Int(v), NumKind::Double) => Literal::Double(f64::from(*v)),
            (Literal::Long(v), NumKind::BigInteger) => Literal::BigInteger(i128::from(*v)),
            (Literal::Long(v), NumKind::Float) => Literal::Float(*v as f32),
            (Literal::Long(v), NumKind::Double) => Literal::Double(*v as f64),
            (Literal::Float(v), NumKind::Double) => Literal::Double(f64::from(*v)),
            (Literal::Short(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            (Literal::Int(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            (Literal::Long(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            (Literal::BigInteger(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            (Literal::Float(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            (Literal::Double(v), NumKind::BigDecimal) => Literal::BigDecimal(v.to_string()),
            _ => return None,
        };
        Some(lit)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Char(c) => write!(f, "{:?}", c),
            Literal::Short(v) => write!(f, "{}s", v),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::BigInteger(v) => write!(f, "{}B", v),
            Literal::Float(v) => write!(f, "{:?}f", v),
            Literal::Double(v) => write!(f, "{:?}d", v),
            Literal::BigDecimal(v) => write!(f, "{}D", v),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

// ── Operators ──────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `a ?: b` -- `a` unless it is null.
    Elvis,
    /// `a instanceof T`.
    InstanceOf,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Elvis => "?:",
            BinOp::InstanceOf => "instanceof",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Navigation ─────────────────────────────────────────────────────────

/// The direction of a navigation step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    Child,
    #[serde(rename = "self")]
    SelfAxis,
    Parent,
    Attribute,
    Ancestor,
    AncestorOrSelf,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Preceding,
    PrecedingSibling,
    /// An axis contributed by a navigator provider.
    Custom(String),
}

impl Axis {
    pub fn name(&self) -> &str {
        match self {
            Axis::Child => "child",
            Axis::SelfAxis => "self",
            Axis::Parent => "parent",
            Axis::Attribute => "attribute",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Following => "following",
            Axis::FollowingSibling => "following-sibling",
            Axis::Preceding => "preceding",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Custom(name) => name,
        }
    }

    /// Parse an axis name; unknown names become custom axes.
    pub fn from_name(name: &str) -> Axis {
        match name {
            "child" => Axis::Child,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "attribute" => Axis::Attribute,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following" => Axis::Following,
            "following-sibling" => Axis::FollowingSibling,
            "preceding" => Axis::Preceding,
            "preceding-sibling" => Axis::PrecedingSibling,
            other => Axis::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The concrete sequence a reduction step collects into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// `\[[]]`
    Array,
    /// `\[]`
    List,
    /// `\{}`
    Set,
}

impl Reduction {
    pub fn notation(self) -> &'static str {
        match self {
            Reduction::Array => "[[]]",
            Reduction::List => "[]",
            Reduction::Set => "{}",
        }
    }

    /// The collected type for elements of type `elem`.
    pub fn collected_ty(self, elem: &Ty) -> Ty {
        match self {
            Reduction::Array => Ty::array(elem.clone()),
            Reduction::List => Ty::list(elem.boxed()),
            Reduction::Set => Ty::set(elem.boxed()),
        }
    }
}

/// What a step navigates to along its axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeTest {
    /// A member name.
    Name(String),
    /// `*`
    Wildcard,
    /// `node()` -- the value in view, unfiltered.
    SelfTest,
    /// An invocation, `name(args)`.
    Call { name: String, args: Vec<Node> },
    /// Collect the values in view into a concrete sequence.
    Reduction(Reduction),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Name(name) => f.write_str(name),
            NodeTest::Wildcard => f.write_str("*"),
            NodeTest::SelfTest => f.write_str("node()"),
            NodeTest::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            NodeTest::Reduction(r) => f.write_str(r.notation()),
        }
    }
}

/// One hop of a navigation stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavStep {
    #[serde(default)]
    pub span: Span,
    pub axis: Axis,
    pub test: NodeTest,
    /// Filters applied left to right to the step's candidates.
    #[serde(default)]
    pub predicates: Vec<Node>,
}

impl NavStep {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        NavStep { span: Span::synthetic(), axis, test, predicates: Vec::new() }
    }

    /// `child::name`
    pub fn child(name: &str) -> Self {
        NavStep::new(Axis::Child, NodeTest::Name(name.to_string()))
    }

    /// `self::node()`
    pub fn self_node() -> Self {
        NavStep::new(Axis::SelfAxis, NodeTest::SelfTest)
    }

    /// `child::name(args)`
    pub fn call(name: &str, args: Vec<Node>) -> Self {
        NavStep::new(Axis::Child, NodeTest::Call { name: name.to_string(), args })
    }

    pub fn reduce(reduction: Reduction) -> Self {
        NavStep::new(Axis::Child, NodeTest::Reduction(reduction))
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_predicate(mut self, predicate: Node) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl fmt::Display for NavStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis, self.test)?;
        for pred in &self.predicates {
            write!(f, "[{}]", pred)?;
        }
        Ok(())
    }
}

// ── Declarations ───────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// A method declared in the compilation unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    /// `None` when the return type is inferred from the body.
    #[serde(default)]
    pub return_ty: Option<Ty>,
    #[serde(default)]
    pub body: Vec<Node>,
}

// ── Resolved forms ─────────────────────────────────────────────────────

/// The kind of an explicit runtime conversion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conversion {
    /// Numeric widening to the node's type.
    Widen,
    /// Primitive to its reference type.
    Box,
    /// Reference type to its primitive.
    Unbox,
}

impl Conversion {
    pub fn name(self) -> &'static str {
        match self {
            Conversion::Widen => "widen",
            Conversion::Box => "box",
            Conversion::Unbox => "unbox",
        }
    }
}

/// A stream combinator applying a per-element lambda.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipeOp {
    Map,
    FlatMap,
    Filter,
}

impl PipeOp {
    pub fn name(self) -> &'static str {
        match self {
            PipeOp::Map => "map",
            PipeOp::FlatMap => "flat-map",
            PipeOp::Filter => "filter",
        }
    }
}

/// A request for one specific evaluation-stack instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instr {
    /// Duplicate the top of the evaluation stack.
    Dup,
    /// Discard the top of the evaluation stack.
    Pop,
}

// ── Nodes ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Produced by the front end.
    Script(Vec<Node>),
    Literal(Literal),
    /// A bare identifier outside a navigation stream.
    Name(String),
    /// A bare call outside a navigation stream.
    Call { name: String, args: Vec<Node> },
    Stream(Vec<NavStep>),
    Binary { op: BinOp, lhs: Box<Node>, rhs: Box<Node> },
    Conditional { cond: Box<Node>, then_branch: Box<Node>, else_branch: Box<Node> },
    MethodDecl(MethodDecl),
    LocalDecl { name: String, declared: Option<Ty>, value: Box<Node> },

    // Produced by the semantic passes.
    /// The ambient binding value.
    This,
    /// The value left on the evaluation stack by the previous chain link.
    Stacked,
    LocalRef(String),
    /// A type used as a value; typed `Class<T>`.
    TypeRef(Ty),
    PropertyRead { target: Box<Node>, name: String },
    MethodCall { target: Box<Node>, owner: Ty, name: String, args: Vec<Node> },
    OperatorCall { owner: Ty, method: String, lhs: Box<Node>, rhs: Box<Node> },
    /// Runtime conversion to the node's own type.
    Convert { conversion: Conversion, expr: Box<Node> },
    /// Lazy sequence over a multi-valued value; null yields an empty sequence.
    ToSequence(Box<Node>),
    Pipe { op: PipeOp, source: Box<Node>, param: String, body: Box<Node> },
    Collect { source: Box<Node>, into: Reduction },
    Let { name: String, value: Box<Node>, body: Box<Node> },
    IsNull(Box<Node>),
    /// Children emitted in order; the net stack effect is their sum.
    Sequence(Vec<Node>),
    Instr(Instr),
}

impl NodeKind {
    /// Variant name, for internal error reporting.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Script(_) => "Script",
            NodeKind::Literal(_) => "Literal",
            NodeKind::Name(_) => "Name",
            NodeKind::Call { .. } => "Call",
            NodeKind::Stream(_) => "Stream",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Conditional { .. } => "Conditional",
            NodeKind::MethodDecl(_) => "MethodDecl",
            NodeKind::LocalDecl { .. } => "LocalDecl",
            NodeKind::This => "This",
            NodeKind::Stacked => "Stacked",
            NodeKind::LocalRef(_) => "LocalRef",
            NodeKind::TypeRef(_) => "TypeRef",
            NodeKind::PropertyRead { .. } => "PropertyRead",
            NodeKind::MethodCall { .. } => "MethodCall",
            NodeKind::OperatorCall { .. } => "OperatorCall",
            NodeKind::Convert { .. } => "Convert",
            NodeKind::ToSequence(_) => "ToSequence",
            NodeKind::Pipe { .. } => "Pipe",
            NodeKind::Collect { .. } => "Collect",
            NodeKind::Let { .. } => "Let",
            NodeKind::IsNull(_) => "IsNull",
            NodeKind::Sequence(_) => "Sequence",
            NodeKind::Instr(_) => "Instr",
        }
    }
}

/// A syntax tree node: span, resolved type and variant payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub span: Span,
    #[serde(default)]
    pub ty: Option<Ty>,
    pub kind: NodeKind,
}

impl Default for Node {
    /// An untyped synthetic `null`, used as a placeholder while a child is
    /// moved out of its slot.
    fn default() -> Self {
        Node::new(NodeKind::Literal(Literal::Null))
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node { span: Span::synthetic(), ty: None, kind }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn typed(mut self, ty: Ty) -> Self {
        self.ty = Some(ty);
        self
    }

    /// A literal typed with its natural type.
    pub fn literal(lit: Literal) -> Self {
        let ty = lit.ty();
        Node::new(NodeKind::Literal(lit)).typed(ty)
    }

    /// A `null` literal carrying the type it stands in for.
    pub fn null(ty: Ty) -> Self {
        Node::new(NodeKind::Literal(Literal::Null)).typed(ty)
    }

    pub fn name(name: &str) -> Self {
        Node::new(NodeKind::Name(name.to_string()))
    }

    pub fn call(name: &str, args: Vec<Node>) -> Self {
        Node::new(NodeKind::Call { name: name.to_string(), args })
    }

    pub fn stream(steps: Vec<NavStep>) -> Self {
        Node::new(NodeKind::Stream(steps))
    }

    pub fn binary(op: BinOp, lhs: Node, rhs: Node) -> Self {
        Node::new(NodeKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn conditional(cond: Node, then_branch: Node, else_branch: Node) -> Self {
        Node::new(NodeKind::Conditional {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn script(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Script(items))
    }

    pub fn this(ty: Ty) -> Self {
        Node::new(NodeKind::This).typed(ty)
    }

    pub fn stacked(ty: Ty) -> Self {
        Node::new(NodeKind::Stacked).typed(ty)
    }

    pub fn local_ref(name: &str, ty: Ty) -> Self {
        Node::new(NodeKind::LocalRef(name.to_string())).typed(ty)
    }

    pub fn convert(conversion: Conversion, expr: Node, to: Ty) -> Self {
        let span = expr.span.clone();
        Node::new(NodeKind::Convert { conversion, expr: Box::new(expr) })
            .at(span)
            .typed(to)
    }

    pub fn instr(instr: Instr) -> Self {
        Node::new(NodeKind::Instr(instr))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, NodeKind::Literal(_))
    }

    /// The type as a display string, `?` when unresolved.
    pub fn ty_name(&self) -> String {
        self.ty.as_ref().map_or_else(|| "?".to_string(), Ty::to_string)
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Script(items) | NodeKind::Sequence(items) => items.iter().collect(),
            NodeKind::Call { args, .. } => args.iter().collect(),
            NodeKind::Stream(steps) => steps.iter().flat_map(step_children).collect(),
            NodeKind::Binary { lhs, rhs, .. } | NodeKind::OperatorCall { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            NodeKind::Conditional { cond, then_branch, else_branch } => {
                vec![cond, then_branch, else_branch]
            }
            NodeKind::MethodDecl(decl) => decl.body.iter().collect(),
            NodeKind::LocalDecl { value, .. } => vec![value],
            NodeKind::PropertyRead { target, .. } => vec![target],
            NodeKind::MethodCall { target, args, .. } => {
                std::iter::once(&**target).chain(args.iter()).collect()
            }
            NodeKind::Convert { expr, .. }
            | NodeKind::ToSequence(expr)
            | NodeKind::IsNull(expr) => vec![expr],
            NodeKind::Pipe { source, body, .. } => vec![source, body],
            NodeKind::Collect { source, .. } => vec![source],
            NodeKind::Let { value, body, .. } => vec![value, body],
            NodeKind::Literal(_)
            | NodeKind::Name(_)
            | NodeKind::This
            | NodeKind::Stacked
            | NodeKind::LocalRef(_)
            | NodeKind::TypeRef(_)
            | NodeKind::Instr(_) => Vec::new(),
        }
    }

    /// Mutable child slots, in the same order as [`Node::children`].
    fn child_slots_mut(&mut self) -> Vec<&mut Node> {
        match &mut self.kind {
            NodeKind::Script(items) | NodeKind::Sequence(items) => items.iter_mut().collect(),
            NodeKind::Call { args, .. } => args.iter_mut().collect(),
            NodeKind::Stream(steps) => steps.iter_mut().flat_map(step_children_mut).collect(),
            NodeKind::Binary { lhs, rhs, .. } | NodeKind::OperatorCall { lhs, rhs, .. } => {
                vec![&mut **lhs, &mut **rhs]
            }
            NodeKind::Conditional { cond, then_branch, else_branch } => {
                vec![&mut **cond, &mut **then_branch, &mut **else_branch]
            }
            NodeKind::MethodDecl(decl) => decl.body.iter_mut().collect(),
            NodeKind::LocalDecl { value, .. } => vec![&mut **value],
            NodeKind::PropertyRead { target, .. } => vec![&mut **target],
            NodeKind::MethodCall { target, args, .. } => {
                std::iter::once(&mut **target).chain(args.iter_mut()).collect()
            }
            NodeKind::Convert { expr, .. }
            | NodeKind::ToSequence(expr)
            | NodeKind::IsNull(expr) => vec![&mut **expr],
            NodeKind::Pipe { source, body, .. } => vec![&mut **source, &mut **body],
            NodeKind::Collect { source, .. } => vec![&mut **source],
            NodeKind::Let { value, body, .. } => vec![&mut **value, &mut **body],
            NodeKind::Literal(_)
            | NodeKind::Name(_)
            | NodeKind::This
            | NodeKind::Stacked
            | NodeKind::LocalRef(_)
            | NodeKind::TypeRef(_)
            | NodeKind::Instr(_) => Vec::new(),
        }
    }

    /// Rebuild the node by passing every child through `f`, in order.
    pub fn map_children<F>(mut self, mut f: F) -> Result<Node>
    where
        F: FnMut(Node) -> Result<Node>,
    {
        for slot in self.child_slots_mut() {
            let child = std::mem::take(slot);
            *slot = f(child)?;
        }
        Ok(self)
    }

    /// Replace all children at once. The count must match [`Node::children`].
    pub fn with_children(mut self, children: Vec<Node>) -> Result<Node> {
        let label = self.kind.label();
        let mut slots = self.child_slots_mut();
        if slots.len() != children.len() {
            return Err(InternalError::ChildCountMismatch {
                node: label,
                expected: slots.len(),
                found: children.len(),
            });
        }
        for (slot, child) in slots.iter_mut().zip(children) {
            **slot = child;
        }
        Ok(self)
    }

    /// Pre-order traversal.
    pub fn walk<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Whether any node in the subtree satisfies `pred`.
    pub fn any<F: Fn(&Node) -> bool>(&self, pred: &F) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }
}

fn step_children(step: &NavStep) -> Vec<&Node> {
    let mut out: Vec<&Node> = Vec::new();
    if let NodeTest::Call { args, .. } = &step.test {
        out.extend(args.iter());
    }
    out.extend(step.predicates.iter());
    out
}

fn step_children_mut(step: &mut NavStep) -> Vec<&mut Node> {
    let mut out: Vec<&mut Node> = Vec::new();
    if let NodeTest::Call { args, .. } = &mut step.test {
        out.extend(args.iter_mut());
    }
    out.extend(step.predicates.iter_mut());
    out
}
