//! Navigation resolution.
//!
//! Rewrites every navigation stream into an executable expression chain.
//! Resolution runs in two phases:
//!
//! 1. **Forward.** Each step is resolved through the scope chain against
//!    the type in view. Steps after the first are resolved with a chained
//!    bound-navigation scope for the previous result pushed, so they read
//!    from the evaluation stack. A multi-valued result followed by more
//!    steps switches the stream to element context: the type in view
//!    becomes the element type. Predicates are resolved with the candidate
//!    bound to a fresh local.
//! 2. **Lowering.** The resolved links are assembled back to front. Links
//!    in scalar context are chained with null guards, so a null anywhere
//!    short-circuits the remainder to a typed `null`. In element context the
//!    links become stream stages (`map`, `flat-map`, `filter`) over a lazy
//!    sequence, and a reduction collects the sequence back into an array,
//!    list or set, returning to scalar context. A null element never
//!    satisfies a filter.
//!
//! A step no scope resolves is reported once and the stream is left as it
//! was.

use std::mem;

use tracing::{debug, instrument, trace};
use trail_common::error::Result;
use trail_common::InternalError;
use trail_syntax::{
    Conversion, Instr, Literal, NavStep, Node, NodeKind, NodeTest, PipeOp, Reduction, Ty, TyCon,
};

use crate::error::SemaError;
use crate::pass::{Context, Pass};
use crate::scope::{Anchor, ResolveCx, Scope, ScopeChain, StepPosition};
use crate::types::MethodSig;

/// One resolved element of a chain, before lowering.
#[derive(Debug)]
struct Link {
    kind: LinkKind,
    /// The link's result type, or the candidate type for predicates.
    ty: Ty,
}

#[derive(Debug)]
enum LinkKind {
    /// A step expression. Every step but the head reads its receiver from
    /// the stack.
    Step(Node),
    /// A predicate over the candidate bound to `param`.
    Predicate { param: String, cond: Node },
    Reduce(Reduction),
}

/// The navigation-resolution pass.
#[derive(Default)]
pub struct NavigationResolver {
    scopes: ScopeChain,
    next_fresh: usize,
    box_primitive_guards: bool,
}

impl NavigationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("${}{}", prefix, self.next_fresh);
        self.next_fresh += 1;
        name
    }

    fn rewrite(&mut self, node: Node, cx: &mut Context<'_>) -> Result<Node> {
        match &node.kind {
            NodeKind::Stream(_) => self.resolve_stream(node, cx),
            NodeKind::Name(_) | NodeKind::Call { .. } => self.resolve_bare(node, cx),
            NodeKind::MethodDecl(_) => self.resolve_method(node, cx),
            NodeKind::LocalDecl { .. } => {
                let mut node = node.map_children(|c| self.rewrite(c, cx))?;
                if let NodeKind::LocalDecl { name, declared, value } = &node.kind {
                    let ty = declared.clone().or_else(|| value.ty.clone());
                    if let Some(ty) = &ty {
                        self.scopes.declare_local(name, ty.clone());
                    }
                    node.ty = ty;
                }
                Ok(node)
            }
            NodeKind::Script(_) => {
                let mut node = node.map_children(|c| self.rewrite(c, cx))?;
                if let NodeKind::Script(items) = &node.kind {
                    node.ty = items.last().and_then(|n| n.ty.clone());
                }
                Ok(node)
            }
            _ => node.map_children(|c| self.rewrite(c, cx)),
        }
    }

    /// A bare name or call is a one-step navigation at the head.
    fn resolve_bare(&mut self, node: Node, cx: &mut Context<'_>) -> Result<Node> {
        let node = node.map_children(|c| self.rewrite(c, cx))?;
        let step = match &node.kind {
            NodeKind::Name(name) => NavStep::child(name),
            NodeKind::Call { name, args } => NavStep::call(name, args.clone()),
            _ => return Ok(node),
        }
        .at(node.span.clone());
        let rcx = ResolveCx { types: cx.types, navigators: cx.navigators };
        match self.scopes.resolve(&step, StepPosition::Head, rcx) {
            Some(resolved) if resolved.ty.is_some() => Ok(resolved.at(node.span)),
            Some(_) => Err(InternalError::UntypedReplacement { step: step.to_string() }),
            // Left for the late reporter.
            None => Ok(node),
        }
    }

    fn resolve_method(&mut self, node: Node, cx: &mut Context<'_>) -> Result<Node> {
        let params = match &node.kind {
            NodeKind::MethodDecl(decl) => {
                decl.params.iter().map(|p| (p.name.clone(), p.ty.clone())).collect()
            }
            _ => return Ok(node),
        };
        self.scopes.push(Scope::Method(params));
        let rewritten = node.map_children(|c| self.rewrite(c, cx));
        self.scopes.pop()?;
        let mut node = rewritten?;
        if let NodeKind::MethodDecl(decl) = &node.kind {
            node.ty = Some(match &decl.return_ty {
                Some(ty) => ty.clone(),
                None => decl.body.last().and_then(|n| n.ty.clone()).unwrap_or_else(Ty::void),
            });
        }
        Ok(node)
    }

    #[instrument(level = "debug", skip_all, fields(stream = %node))]
    fn resolve_stream(&mut self, node: Node, cx: &mut Context<'_>) -> Result<Node> {
        let original = node.clone();
        let span = node.span.clone();
        let steps = match node.kind {
            NodeKind::Stream(steps) => steps,
            _ => return Ok(original),
        };
        if steps.is_empty() {
            return Err(InternalError::EmptyStream(span.to_string()));
        }

        // Call arguments belong to the enclosing context, not the chain.
        let mut resolved_steps = Vec::with_capacity(steps.len());
        for mut step in steps {
            if let NodeTest::Call { args, .. } = &mut step.test {
                let taken = mem::take(args);
                *args = taken
                    .into_iter()
                    .map(|a| self.rewrite(a, cx))
                    .collect::<Result<Vec<_>>>()?;
            }
            resolved_steps.push(step);
        }

        match self.resolve_links(&resolved_steps, cx)? {
            Some(links) => Ok(self.lower_scalar(Vec::new(), links)?.at(span)),
            None => Ok(original),
        }
    }

    /// Forward phase. `None` once a step fails; the diagnostic is recorded.
    fn resolve_links(&mut self, steps: &[NavStep], cx: &mut Context<'_>) -> Result<Option<Vec<Link>>> {
        let mut links = Vec::with_capacity(steps.len());
        let mut in_view: Option<Ty> = None;
        let mut streaming = false;
        let last = steps.len() - 1;

        for (i, step) in steps.iter().enumerate() {
            let link = match &step.test {
                NodeTest::Reduction(reduction) => match (&in_view, streaming) {
                    (Some(elem), true) => Some(Link {
                        kind: LinkKind::Reduce(*reduction),
                        ty: reduction.collected_ty(elem),
                    }),
                    // An already collected value is re-collected element by element.
                    (Some(multi), false) if multi.is_multi_valued() => Some(Link {
                        kind: LinkKind::Reduce(*reduction),
                        ty: reduction.collected_ty(&element_of(multi)?),
                    }),
                    _ => None,
                },
                _ => self.resolve_step(step, in_view.as_ref(), cx)?,
            };
            let Some(link) = link else {
                debug!(step = %step, in_view = ?in_view, "unresolved step");
                cx.diagnostics.push(SemaError::UnresolvedStep {
                    step: step.to_string(),
                    in_view,
                    span: step.span.clone(),
                });
                return Ok(None);
            };

            let more = i < last || !step.predicates.is_empty();
            let candidate = match &link.kind {
                LinkKind::Reduce(_) => {
                    streaming = false;
                    link.ty.clone()
                }
                _ if more && link.ty.is_multi_valued() => {
                    trace!(step = %step, ty = %link.ty, "entering element context");
                    streaming = true;
                    element_of(&link.ty)?
                }
                _ => link.ty.clone(),
            };
            links.push(link);

            for predicate in &step.predicates {
                let link = self.resolve_predicate(predicate.clone(), &candidate, cx)?;
                links.push(link);
            }
            in_view = Some(candidate);
        }
        Ok(Some(links))
    }

    fn resolve_step(&mut self, step: &NavStep, in_view: Option<&Ty>, cx: &mut Context<'_>) -> Result<Option<Link>> {
        let rcx = ResolveCx { types: cx.types, navigators: cx.navigators };
        let resolved = match in_view {
            None => self.scopes.resolve(step, StepPosition::Head, rcx),
            Some(ty) => {
                self.scopes.push(Scope::chained(ty.clone()));
                let resolved = self.scopes.resolve(step, StepPosition::Tail, rcx);
                self.scopes.pop()?;
                resolved
            }
        };
        let Some(node) = resolved else {
            return Ok(None);
        };
        let ty = node
            .ty
            .clone()
            .ok_or_else(|| InternalError::UntypedReplacement { step: step.to_string() })?;
        Ok(Some(Link { kind: LinkKind::Step(node), ty }))
    }

    fn resolve_predicate(&mut self, predicate: Node, candidate: &Ty, cx: &mut Context<'_>) -> Result<Link> {
        let param = self.fresh("p");
        self.scopes.push(Scope::Bound {
            ty: candidate.clone(),
            anchor: Anchor::Subject(Node::local_ref(&param, candidate.clone())),
        });
        let cond = self.rewrite(predicate, cx);
        self.scopes.pop()?;
        Ok(Link { kind: LinkKind::Predicate { param, cond: cond? }, ty: candidate.clone() })
    }

    // ── Lowering ───────────────────────────────────────────────────────

    /// Lower links in scalar context, after the already-lowered `seed`.
    fn lower_scalar(&mut self, seed: Vec<Node>, links: Vec<Link>) -> Result<Node> {
        let mut chain = seed;
        let mut links = links.into_iter().peekable();
        while let Some(link) = links.next() {
            match link.kind {
                LinkKind::Step(expr) => {
                    let escalate = link.ty.is_multi_valued() && links.peek().is_some();
                    chain.push(expr);
                    if escalate {
                        let rest: Vec<Link> = links.by_ref().collect();
                        chain.push(self.lower_stream(&link.ty, rest)?);
                    }
                }
                LinkKind::Predicate { param, cond } => {
                    chain.push(scalar_filter(param, cond, &link.ty));
                }
                LinkKind::Reduce(reduction) => {
                    let multi = chain
                        .last()
                        .and_then(|n| n.ty.clone())
                        .filter(Ty::is_multi_valued)
                        .ok_or(InternalError::ReductionOutsideStream)?;
                    let mut rest = vec![Link { kind: LinkKind::Reduce(reduction), ty: link.ty }];
                    rest.extend(links.by_ref());
                    chain.push(self.lower_stream(&multi, rest)?);
                }
            }
        }
        fuse_this(&mut chain)?;
        self.guard_chain(chain)
    }

    /// Lower the links following a multi-valued value of type `multi`.
    fn lower_stream(&mut self, multi: &Ty, links: Vec<Link>) -> Result<Node> {
        let mut elem = element_of(multi)?;
        let mut source = Node::new(NodeKind::ToSequence(Box::new(Node::stacked(multi.clone()))))
            .typed(Ty::stream(elem.clone()));
        let mut run: Vec<Node> = Vec::new();
        let mut links = links.into_iter();

        while let Some(link) = links.next() {
            match link.kind {
                LinkKind::Step(expr) => {
                    let nested = link.ty.is_multi_valued();
                    run.push(expr);
                    if nested {
                        source = self.stage(source, &mut elem, mem::take(&mut run), true)?;
                    }
                }
                LinkKind::Predicate { param, cond } => {
                    if !run.is_empty() {
                        source = self.stage(source, &mut elem, mem::take(&mut run), false)?;
                    }
                    let ty = Ty::stream(elem.clone());
                    let cond = null_safe_condition(&param, cond, &elem);
                    source = pipe(PipeOp::Filter, source, param, cond, ty);
                }
                LinkKind::Reduce(reduction) => {
                    if !run.is_empty() {
                        source = self.stage(source, &mut elem, mem::take(&mut run), false)?;
                    }
                    let collected = Node::new(NodeKind::Collect { source: Box::new(source), into: reduction })
                        .typed(reduction.collected_ty(&elem));
                    return self.lower_scalar(vec![collected], links.collect());
                }
            }
        }
        if !run.is_empty() {
            source = self.stage(source, &mut elem, run, false)?;
        }
        Ok(source)
    }

    /// One `map` (or `flat-map`, when the run ends multi-valued) stage over
    /// `source`. The element is null-guarded like any other chain link.
    fn stage(&mut self, source: Node, elem: &mut Ty, run: Vec<Node>, flatten: bool) -> Result<Node> {
        let param = self.fresh("e");
        let mut chain = vec![Node::local_ref(&param, elem.clone())];
        chain.extend(run);
        let body = self.guard_chain(chain)?;
        let body_ty = ty_of(&body)?;
        if flatten {
            let inner = element_of(&body_ty)?;
            let body = Node::new(NodeKind::ToSequence(Box::new(body))).typed(Ty::stream(inner.clone()));
            *elem = inner;
            Ok(pipe(PipeOp::FlatMap, source, param, body, Ty::stream(elem.clone())))
        } else {
            *elem = body_ty;
            Ok(pipe(PipeOp::Map, source, param, body, Ty::stream(elem.clone())))
        }
    }

    /// Chain the links back to front, guarding each link's input.
    fn guard_chain(&mut self, chain: Vec<Node>) -> Result<Node> {
        let mut chain = chain.into_iter().rev();
        let mut body = chain.next().ok_or(InternalError::Untyped { node: "chain" })?;
        for subject in chain {
            body = self.guard(subject, body)?;
        }
        Ok(body)
    }

    /// `subject dup (if (null? _) (pop null) body)`: evaluate `subject`
    /// once and either short-circuit to a typed null or hand it to `body`.
    fn guard(&mut self, subject: Node, body: Node) -> Result<Node> {
        let subject_ty = ty_of(&subject)?;
        let body_ty = ty_of(&body)?;
        let span = body.span.clone();

        if subject_ty.is_primitive() && !self.box_primitive_guards {
            return Ok(Node::new(NodeKind::Sequence(vec![subject, body])).at(span).typed(body_ty));
        }

        let result_ty = body_ty.boxed();
        let body = if body_ty.is_primitive() {
            Node::convert(Conversion::Box, body, result_ty.clone())
        } else {
            body
        };
        let (subject, stacked_ty, body) = if subject_ty.is_primitive() {
            let boxed = subject_ty.boxed();
            let unbox = Node::convert(Conversion::Unbox, Node::stacked(boxed.clone()), subject_ty.clone());
            let body = Node::new(NodeKind::Sequence(vec![unbox, body])).typed(result_ty.clone());
            (Node::convert(Conversion::Box, subject, boxed.clone()), boxed, body)
        } else {
            (subject, subject_ty, body)
        };

        let is_null = Node::new(NodeKind::IsNull(Box::new(Node::stacked(stacked_ty)))).typed(Ty::boolean());
        let short_circuit = Node::new(NodeKind::Sequence(vec![
            Node::instr(Instr::Pop),
            Node::null(result_ty.clone()),
        ]))
        .typed(result_ty.clone());
        let branch = Node::conditional(is_null, short_circuit, body).typed(result_ty.clone());
        Ok(Node::new(NodeKind::Sequence(vec![subject, Node::instr(Instr::Dup), branch]))
            .at(span)
            .typed(result_ty))
    }
}

impl Pass for NavigationResolver {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node> {
        self.scopes = ScopeChain::new();
        self.next_fresh = 0;
        self.box_primitive_guards = cx.config.box_primitive_guards;

        let imports = cx
            .env
            .imports
            .iter()
            .map(|con: &TyCon| (con.name.clone(), con.clone()))
            .collect();
        self.scopes.push(Scope::Import(imports));
        if let Some(enclosing) = &cx.env.enclosing {
            self.scopes.push(Scope::TypeDecl { ty: enclosing.clone(), methods: declared_methods(&root) });
        }
        self.scopes.push(Scope::Bound {
            ty: cx.env.binding.clone(),
            anchor: Anchor::Subject(Node::this(cx.env.binding.clone())),
        });
        // Script-level locals.
        self.scopes.push(Scope::Method(Default::default()));

        self.rewrite(root, cx)
    }
}

/// Signatures of the methods declared at the top level of the unit. An
/// inferred return type is seen as `Object` by callers.
fn declared_methods(root: &Node) -> Vec<MethodSig> {
    let items = match &root.kind {
        NodeKind::Script(items) => items.as_slice(),
        _ => std::slice::from_ref(root),
    };
    items
        .iter()
        .filter_map(|item| match &item.kind {
            NodeKind::MethodDecl(decl) => Some(MethodSig {
                name: decl.name.clone(),
                params: decl.params.iter().map(|p| p.ty.clone()).collect(),
                ret: decl.return_ty.clone().unwrap_or_else(Ty::object),
            }),
            _ => None,
        })
        .collect()
}

/// `this` cannot be null, so a chain starting at `this` reads it in place
/// instead of guarding it.
fn fuse_this(chain: &mut Vec<Node>) -> Result<()> {
    if chain.len() < 2 || chain[0].kind != NodeKind::This {
        return Ok(());
    }
    let mut head = Some(chain.remove(0));
    let next = mem::take(&mut chain[0]);
    chain[0] = substitute_stacked(next, &mut head)?;
    Ok(())
}

/// Replace the first stacked value read in evaluation order.
fn substitute_stacked(node: Node, replacement: &mut Option<Node>) -> Result<Node> {
    if replacement.is_none() {
        return Ok(node);
    }
    if node.kind == NodeKind::Stacked {
        if let Some(value) = replacement.take() {
            return Ok(value);
        }
    }
    node.map_children(|child| substitute_stacked(child, replacement))
}

/// A predicate in scalar context: `(let p _ (if cond p null))`.
fn scalar_filter(param: String, cond: Node, ty: &Ty) -> Node {
    let result_ty = ty.boxed();
    let candidate = Node::local_ref(&param, ty.clone());
    let candidate = if ty.is_primitive() {
        Node::convert(Conversion::Box, candidate, result_ty.clone())
    } else {
        candidate
    };
    let span = cond.span.clone();
    let branch = Node::conditional(cond, candidate, Node::null(result_ty.clone())).typed(result_ty.clone());
    Node::new(NodeKind::Let {
        name: param,
        value: Box::new(Node::stacked(ty.clone())),
        body: Box::new(branch),
    })
    .at(span)
    .typed(result_ty)
}

/// `(if (null? param) false cond)`, so a filter drops null elements
/// instead of reading through them.
fn null_safe_condition(param: &str, cond: Node, elem: &Ty) -> Node {
    if elem.is_primitive() {
        return cond;
    }
    let span = cond.span.clone();
    let is_null = Node::new(NodeKind::IsNull(Box::new(Node::local_ref(param, elem.clone())))).typed(Ty::boolean());
    Node::conditional(is_null, Node::literal(Literal::Bool(false)), cond)
        .at(span)
        .typed(Ty::boolean())
}

fn pipe(op: PipeOp, source: Node, param: String, body: Node, ty: Ty) -> Node {
    Node::new(NodeKind::Pipe { op, source: Box::new(source), param, body: Box::new(body) }).typed(ty)
}

fn ty_of(node: &Node) -> Result<Ty> {
    node.ty.clone().ok_or(InternalError::Untyped { node: node.kind.label() })
}

fn element_of(ty: &Ty) -> Result<Ty> {
    ty.element_type().cloned().ok_or_else(|| InternalError::NotMultiValued(ty.to_string()))
}
