//! Scope chain for contextual step resolution.
//!
//! A stack of scopes searched innermost first. A scope either resolves a
//! step to a replacement expression or declines; the first scope that
//! resolves wins.
//!
//! Steps are resolved either at the head of a chain, where nothing is on
//! the evaluation stack yet, or in its tail, where the previous link's value
//! is. Imports, locals and members of the enclosing type only make sense at
//! the head. A bound-navigation scope anchored on the stacked value answers
//! only tail requests; one anchored on a concrete subject (the ambient
//! binding, a predicate candidate) answers only head requests.

use rustc_hash::FxHashMap;
use tracing::trace;
use trail_common::InternalError;
use trail_syntax::{Axis, NavStep, Node, NodeKind, NodeTest, Ty, TyCon};

use crate::navigators::{NavRequest, NavigatorRegistry};
use crate::types::{MethodSig, TypeInfo};

/// Where in a chain a step is being resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepPosition {
    Head,
    Tail,
}

/// What a bound-navigation scope navigates from.
#[derive(Clone, Debug, PartialEq)]
pub enum Anchor {
    /// The value the previous chain link left on the evaluation stack.
    Stacked,
    /// A concrete expression, re-evaluated at each use.
    Subject(Node),
}

/// One frame of the scope chain.
#[derive(Clone, Debug)]
pub enum Scope {
    /// Imported type names, usable as type references.
    Import(FxHashMap<String, TyCon>),
    /// Parameters and locals of the method (or script) being analysed.
    Method(FxHashMap<String, Ty>),
    /// Members of the enclosing type, reached through `this`.
    TypeDecl { ty: Ty, methods: Vec<MethodSig> },
    /// Navigation from a value of known type.
    Bound { ty: Ty, anchor: Anchor },
}

/// Collaborators a scope may consult.
#[derive(Copy, Clone)]
pub struct ResolveCx<'a> {
    pub types: &'a dyn TypeInfo,
    pub navigators: &'a NavigatorRegistry,
}

impl Scope {
    /// A scope navigating from the previous chain link.
    pub fn chained(ty: Ty) -> Self {
        Scope::Bound { ty, anchor: Anchor::Stacked }
    }

    /// A scope navigating from `subject`, which must be typed.
    pub fn anchored(subject: Node) -> Option<Self> {
        let ty = subject.ty.clone()?;
        Some(Scope::Bound { ty, anchor: Anchor::Subject(subject) })
    }

    pub fn resolve(&self, step: &NavStep, position: StepPosition, cx: ResolveCx<'_>) -> Option<Node> {
        match self {
            Scope::Import(imports) => {
                let name = head_name(step, position)?;
                let con = imports.get(name)?;
                let ty = Ty::Con(con.clone());
                Some(
                    Node::new(NodeKind::TypeRef(ty.clone()))
                        .at(step.span.clone())
                        .typed(Ty::class_of(ty)),
                )
            }
            Scope::Method(locals) => {
                let name = head_name(step, position)?;
                let ty = locals.get(name)?;
                Some(Node::local_ref(name, ty.clone()).at(step.span.clone()))
            }
            Scope::TypeDecl { ty, methods } => {
                if position != StepPosition::Head || step.axis != Axis::Child {
                    return None;
                }
                let this = Node::this(ty.clone()).at(step.span.clone());
                match &step.test {
                    NodeTest::Name(name) => {
                        let member = cx.types.property(ty, name)?;
                        Some(
                            Node::new(NodeKind::PropertyRead {
                                target: Box::new(this),
                                name: name.clone(),
                            })
                            .at(step.span.clone())
                            .typed(member.ty),
                        )
                    }
                    NodeTest::Call { name, args } => {
                        let (owner, ret) = match methods
                            .iter()
                            .find(|m| m.name == *name && m.params.len() == args.len())
                        {
                            Some(sig) => (ty.clone(), sig.ret.clone()),
                            None => {
                                let member = cx.types.method(ty, name, args.len())?;
                                (member.owner, member.ty)
                            }
                        };
                        Some(
                            Node::new(NodeKind::MethodCall {
                                target: Box::new(this),
                                owner,
                                name: name.clone(),
                                args: args.clone(),
                            })
                            .at(step.span.clone())
                            .typed(ret),
                        )
                    }
                    _ => None,
                }
            }
            Scope::Bound { ty, anchor } => {
                let receiver = match (anchor, position) {
                    (Anchor::Stacked, StepPosition::Tail) => Node::stacked(ty.clone()),
                    (Anchor::Subject(subject), StepPosition::Head) => subject.clone(),
                    _ => return None,
                };
                let request = NavRequest { step, receiver: &receiver, receiver_ty: ty, types: cx.types };
                cx.navigators
                    .lookup(ty, step, cx.types)
                    .into_iter()
                    .find_map(|nav| {
                        let resolved = nav.apply(&request)?;
                        trace!(step = %step, on = %ty, navigator = nav.label(), "step resolved");
                        Some(resolved)
                    })
            }
        }
    }
}

/// The name a head-only scope may resolve: a plain child-axis name test.
fn head_name(step: &NavStep, position: StepPosition) -> Option<&str> {
    match (&step.test, &step.axis, position) {
        (NodeTest::Name(name), Axis::Child, StepPosition::Head) => Some(name),
        _ => None,
    }
}

/// The scope stack. Index 0 is the outermost scope.
#[derive(Clone, Debug, Default)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Result<Scope, InternalError> {
        self.scopes.pop().ok_or(InternalError::ScopeUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare a local in the innermost method scope. Returns `false` when
    /// no method scope is open.
    pub fn declare_local(&mut self, name: &str, ty: Ty) -> bool {
        match self.scopes.iter_mut().rev().find_map(|s| match s {
            Scope::Method(locals) => Some(locals),
            _ => None,
        }) {
            Some(locals) => {
                locals.insert(name.to_string(), ty);
                true
            }
            None => false,
        }
    }

    /// Resolve a step against the innermost scope that accepts it.
    pub fn resolve(&self, step: &NavStep, position: StepPosition, cx: ResolveCx<'_>) -> Option<Node> {
        self.scopes.iter().rev().find_map(|scope| scope.resolve(step, position, cx))
    }
}
