//! Shared support for the trail-sema integration tests.
//!
//! - a small class model (`Person`, `Address`, `Order`, `Line`)
//! - shortcuts for building streams and running the analyzer
//! - a stack machine that executes resolved trees over an in-memory object
//!   graph, logging every member access so tests can check that null
//!   guards really skip the rest of a chain

#![allow(dead_code)]

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use trail_sema::config::SemaConfig;
use trail_sema::navigators::NavigatorRegistry;
use trail_sema::operators::OperatorRegistry;
use trail_sema::types::{ClassDecl, TypeTable};
use trail_sema::{Analyzer, CompilationUnit, SemaResult, UnitEnv};
use trail_syntax::{
    BinOp, Conversion, Instr, Literal, NavStep, Node, NodeKind, NumKind, PipeOp, Reduction, Ty,
};

// ── Model ──────────────────────────────────────────────────────────────

pub fn model() -> TypeTable {
    let mut table = TypeTable::with_builtins();
    table.add(ClassDecl::named("Named").property("name", Ty::string()));
    table.add(
        ClassDecl::named("Person")
            .implements(Ty::con("Named"))
            .property("age", Ty::int())
            .property("address", Ty::con("Address"))
            .property("friends", Ty::array(Ty::con("Person")))
            .property("orders", Ty::list(Ty::con("Order")))
            .method("greeting", vec![Ty::string()], Ty::string()),
    );
    table.add(
        ClassDecl::named("Address")
            .property("city", Ty::string())
            .property("zip", Ty::int()),
    );
    table.add(
        ClassDecl::named("Order")
            .property("total", Ty::double())
            .property("lines", Ty::array(Ty::con("Line"))),
    );
    table.add(
        ClassDecl::named("Line")
            .property("sku", Ty::string())
            .property("qty", Ty::int()),
    );
    table
}

pub fn person_env() -> UnitEnv {
    UnitEnv { binding: Ty::con("Person"), ..UnitEnv::default() }
}

// ── Tree shortcuts ─────────────────────────────────────────────────────

/// A stream of child-axis name steps.
pub fn path(names: &[&str]) -> Node {
    Node::stream(names.iter().map(|n| NavStep::child(n)).collect())
}

/// `self::node()` followed by child-axis name steps.
pub fn self_path(names: &[&str]) -> Node {
    let mut steps = vec![NavStep::self_node()];
    steps.extend(names.iter().map(|n| NavStep::child(n)));
    Node::stream(steps)
}

pub fn steps(steps: Vec<NavStep>) -> Node {
    Node::stream(steps)
}

pub fn reduce(reduction: Reduction) -> NavStep {
    NavStep::reduce(reduction)
}

pub fn int(v: i32) -> Node {
    Node::literal(Literal::Int(v))
}

pub fn string(s: &str) -> Node {
    Node::literal(Literal::String(s.to_string()))
}

pub fn bin(op: BinOp, lhs: Node, rhs: Node) -> Node {
    Node::binary(op, lhs, rhs)
}

// ── Analysis ───────────────────────────────────────────────────────────

pub fn analyze_with(root: Node, env: UnitEnv, config: SemaConfig) -> SemaResult {
    let types = model();
    let navigators = NavigatorRegistry::standard(config.conflict_policy);
    Analyzer::new(&types, &navigators, OperatorRegistry::global())
        .with_config(config)
        .analyze(CompilationUnit::new(root).with_env(env))
        .expect("analysis hit an internal error")
}

/// Analyse `root` with `this` bound to a `Person`.
pub fn analyze(root: Node) -> SemaResult {
    analyze_with(root, person_env(), SemaConfig::default())
}

pub fn codes(result: &SemaResult) -> Vec<&'static str> {
    result.diagnostics.iter().map(|d| d.code()).collect()
}

// ── Runtime values ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Lit(Literal),
    /// An object on the heap.
    Ref(usize),
    /// An array, list or set.
    List(Vec<Value>),
    /// A lazy sequence, materialised.
    Seq(Vec<Value>),
    Type(String),
}

impl Value {
    pub fn null() -> Value {
        Value::Lit(Literal::Null)
    }

    pub fn int(v: i32) -> Value {
        Value::Lit(Literal::Int(v))
    }

    pub fn str(s: &str) -> Value {
        Value::Lit(Literal::String(s.to_string()))
    }

    pub fn bool(b: bool) -> Value {
        Value::Lit(Literal::Bool(b))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Lit(Literal::Null))
    }
}

pub struct Object {
    pub class: String,
    pub fields: FxHashMap<String, Value>,
}

/// The object graph a tree is executed against. Methods are stored as
/// fields named `name()` holding their result.
#[derive(Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, class: &str, fields: Vec<(&str, Value)>) -> Value {
        self.objects.push(Object {
            class: class.to_string(),
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        });
        Value::Ref(self.objects.len() - 1)
    }

    pub fn set(&mut self, target: &Value, field: &str, value: Value) {
        if let Value::Ref(id) = target {
            self.objects[*id].fields.insert(field.to_string(), value);
        }
    }
}

// ── Machine ────────────────────────────────────────────────────────────

/// Executes a resolved tree.
pub struct Machine<'h> {
    heap: &'h Heap,
    this: Value,
    stack: Vec<Value>,
    locals: Vec<(String, Value)>,
    /// Every member read or invoked, in order.
    pub reads: Vec<String>,
}

type Eval<T> = Result<T, String>;

impl<'h> Machine<'h> {
    pub fn new(heap: &'h Heap, this: Value) -> Self {
        Machine { heap, this, stack: Vec::new(), locals: Vec::new(), reads: Vec::new() }
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        self.locals.push((name.to_string(), value));
    }

    /// Evaluate `node` to a single value. The stack must balance.
    pub fn run(&mut self, node: &Node) -> Eval<Value> {
        let depth = self.stack.len();
        self.eval(node)?;
        let value = self.pop()?;
        if self.stack.len() != depth {
            return Err(format!("unbalanced stack after {}: {:?}", node, self.stack));
        }
        Ok(value)
    }

    fn push(&mut self, value: Value) -> Eval<()> {
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Eval<Value> {
        self.stack.pop().ok_or_else(|| "stack underflow".to_string())
    }

    fn pop_bool(&mut self) -> Eval<bool> {
        match self.pop()? {
            Value::Lit(Literal::Bool(b)) => Ok(b),
            other => Err(format!("expected a boolean, got {:?}", other)),
        }
    }

    fn pop_seq(&mut self) -> Eval<Vec<Value>> {
        match self.pop()? {
            Value::Seq(items) => Ok(items),
            other => Err(format!("expected a sequence, got {:?}", other)),
        }
    }

    fn local(&self, name: &str) -> Eval<Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| format!("unbound local `{}`", name))
    }

    fn with_local<T>(&mut self, name: &str, value: Value, f: impl FnOnce(&mut Self) -> Eval<T>) -> Eval<T> {
        self.bind(name, value);
        let out = f(self);
        self.locals.pop();
        out
    }

    fn eval(&mut self, node: &Node) -> Eval<()> {
        match &node.kind {
            NodeKind::Literal(lit) => self.push(Value::Lit(lit.clone())),
            NodeKind::This => self.push(self.this.clone()),
            // The previous link's value is already on top of the stack.
            NodeKind::Stacked => {
                if self.stack.is_empty() {
                    return Err("stacked read on an empty stack".to_string());
                }
                Ok(())
            }
            NodeKind::LocalRef(name) => {
                let value = self.local(name)?;
                self.push(value)
            }
            NodeKind::TypeRef(ty) => self.push(Value::Type(ty.to_string())),
            NodeKind::PropertyRead { target, name } => {
                self.eval(target)?;
                let receiver = self.pop()?;
                let value = self.member(&receiver, name)?;
                self.push(value)
            }
            NodeKind::MethodCall { target, name, args, .. } => {
                self.eval(target)?;
                for arg in args {
                    self.eval(arg)?;
                }
                let args = self.stack.split_off(self.stack.len().saturating_sub(args.len()));
                let receiver = self.pop()?;
                let value = self.invoke(&receiver, name, &args)?;
                self.push(value)
            }
            NodeKind::OperatorCall { method, lhs, rhs, .. } => {
                self.eval(lhs)?;
                self.eval(rhs)?;
                let r = self.pop()?;
                let l = self.pop()?;
                let value = self.operator(method, l, r)?;
                self.push(value)
            }
            NodeKind::Binary { op: op @ (BinOp::And | BinOp::Or), lhs, rhs } => {
                self.eval(lhs)?;
                let l = self.pop_bool()?;
                if l == (*op == BinOp::Or) {
                    return self.push(Value::bool(l));
                }
                self.eval(rhs)
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.eval(lhs)?;
                self.eval(rhs)?;
                let r = self.pop()?;
                let l = self.pop()?;
                let value = arith(*op, l, r)?;
                self.push(value)
            }
            NodeKind::Conditional { cond, then_branch, else_branch } => {
                self.eval(cond)?;
                if self.pop_bool()? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            NodeKind::Convert { conversion, expr } => {
                self.eval(expr)?;
                let value = self.pop()?;
                let value = match conversion {
                    Conversion::Box => value,
                    Conversion::Unbox if value.is_null() => return Err("unboxing null".to_string()),
                    Conversion::Unbox => value,
                    Conversion::Widen => {
                        let kind = node.ty.as_ref().and_then(NumKind::of).ok_or("widen to non-numeric")?;
                        match value {
                            Value::Lit(lit) => Value::Lit(lit.widen_to(kind).ok_or("narrowing conversion")?),
                            other => return Err(format!("cannot widen {:?}", other)),
                        }
                    }
                };
                self.push(value)
            }
            NodeKind::ToSequence(expr) => {
                self.eval(expr)?;
                let items = match self.pop()? {
                    v if v.is_null() => Vec::new(),
                    Value::List(items) | Value::Seq(items) => items,
                    other => return Err(format!("not multi-valued: {:?}", other)),
                };
                self.push(Value::Seq(items))
            }
            NodeKind::Pipe { op, source, param, body } => {
                self.eval(source)?;
                let items = self.pop_seq()?;
                let mut out = Vec::new();
                for item in items {
                    let result = self.with_local(param, item.clone(), |m| m.run(body))?;
                    match op {
                        PipeOp::Map => out.push(result),
                        PipeOp::FlatMap => match result {
                            Value::Seq(inner) => out.extend(inner),
                            other => return Err(format!("flat-map body produced {:?}", other)),
                        },
                        PipeOp::Filter => {
                            if result == Value::bool(true) {
                                out.push(item);
                            }
                        }
                    }
                }
                self.push(Value::Seq(out))
            }
            NodeKind::Collect { source, into } => {
                self.eval(source)?;
                let mut items = self.pop_seq()?;
                if *into == Reduction::Set {
                    let mut unique: Vec<Value> = Vec::new();
                    for item in items {
                        if !unique.contains(&item) {
                            unique.push(item);
                        }
                    }
                    items = unique;
                }
                self.push(Value::List(items))
            }
            NodeKind::Let { name, value, body } => {
                self.eval(value)?;
                let bound = self.pop()?;
                self.with_local(name, bound, |m| m.eval(body))
            }
            NodeKind::IsNull(expr) => {
                self.eval(expr)?;
                let value = self.pop()?;
                self.push(Value::bool(value.is_null()))
            }
            NodeKind::Sequence(items) => items.iter().try_for_each(|item| self.eval(item)),
            NodeKind::Instr(Instr::Dup) => {
                let top = self.stack.last().cloned().ok_or("dup on an empty stack")?;
                self.push(top)
            }
            NodeKind::Instr(Instr::Pop) => self.pop().map(drop),
            NodeKind::Script(items) => {
                let mut produced = 0;
                for item in items.iter().filter(|i| !matches!(i.kind, NodeKind::MethodDecl(_))) {
                    if produced > 0 {
                        self.pop()?;
                    }
                    self.eval(item)?;
                    produced += 1;
                }
                if produced == 0 {
                    self.push(Value::null())?;
                }
                Ok(())
            }
            NodeKind::LocalDecl { name, value, .. } => {
                self.eval(value)?;
                let bound = self.stack.last().cloned().ok_or("local without a value")?;
                self.bind(name, bound);
                Ok(())
            }
            NodeKind::Name(_) | NodeKind::Call { .. } | NodeKind::Stream(_) | NodeKind::MethodDecl(_) => {
                Err(format!("cannot execute unresolved `{}`", node))
            }
        }
    }

    fn member(&mut self, receiver: &Value, name: &str) -> Eval<Value> {
        self.reads.push(name.to_string());
        match receiver {
            v if v.is_null() => Err(format!("null dereference reading `{}`", name)),
            Value::Ref(id) => Ok(self.heap.objects[*id].fields.get(name).cloned().unwrap_or_else(Value::null)),
            other => Err(format!("no member `{}` on {:?}", name, other)),
        }
    }

    fn invoke(&mut self, receiver: &Value, name: &str, args: &[Value]) -> Eval<Value> {
        self.reads.push(format!("{}()", name));
        match (receiver, name, args) {
            (v, _, _) if v.is_null() => Err(format!("null dereference calling `{}`", name)),
            (Value::Ref(id), _, _) => {
                let field = format!("{}()", name);
                Ok(self.heap.objects[*id].fields.get(&field).cloned().unwrap_or_else(Value::null))
            }
            (Value::List(items) | Value::Seq(items), "size" | "count", []) => {
                Ok(Value::int(items.len() as i32))
            }
            (Value::List(items), "get", [Value::Lit(Literal::Int(i))]) => {
                items.get(*i as usize).cloned().ok_or_else(|| "index out of bounds".to_string())
            }
            (other, _, _) => Err(format!("no method `{}` on {:?}", name, other)),
        }
    }

    fn operator(&self, method: &str, l: Value, r: Value) -> Eval<Value> {
        Ok(match method {
            "concat" => Value::str(&format!("{}{}", display(&l), display(&r))),
            "equals" => Value::bool(l == r),
            "notEquals" => Value::bool(l != r),
            "elvis" => {
                if l.is_null() {
                    r
                } else {
                    l
                }
            }
            "isInstance" => {
                let Value::Type(name) = r else {
                    return Err("isInstance needs a type".to_string());
                };
                Value::bool(match &l {
                    Value::Ref(id) => self.heap.objects[*id].class == name,
                    Value::Lit(Literal::String(_)) => name == "String",
                    _ => false,
                })
            }
            "lessThan" | "lessOrEqual" | "greaterThan" | "greaterOrEqual" => {
                let (Value::Lit(a), Value::Lit(b)) = (&l, &r) else {
                    return Err("ordering needs scalars".to_string());
                };
                let ord = compare(a, b)?;
                Value::bool(match method {
                    "lessThan" => ord == Ordering::Less,
                    "lessOrEqual" => ord != Ordering::Greater,
                    "greaterThan" => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            other => return Err(format!("unknown operator method `{}`", other)),
        })
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Lit(Literal::String(s)) => s.clone(),
        Value::Lit(Literal::Short(v)) => v.to_string(),
        Value::Lit(Literal::Int(v)) => v.to_string(),
        Value::Lit(Literal::Long(v)) => v.to_string(),
        Value::Lit(Literal::BigInteger(v)) => v.to_string(),
        Value::Lit(Literal::Float(v)) => v.to_string(),
        Value::Lit(Literal::Double(v)) => v.to_string(),
        Value::Lit(Literal::BigDecimal(v)) => v.clone(),
        Value::Lit(Literal::Bool(b)) => b.to_string(),
        Value::Lit(Literal::Char(c)) => c.to_string(),
        Value::Lit(Literal::Null) => "null".to_string(),
        other => format!("{:?}", other),
    }
}

// ── Runtime arithmetic ─────────────────────────────────────────────────

fn compare(a: &Literal, b: &Literal) -> Eval<Ordering> {
    let ord = match (a, b) {
        (Literal::Short(x), Literal::Short(y)) => x.cmp(y),
        (Literal::Int(x), Literal::Int(y)) => x.cmp(y),
        (Literal::Long(x), Literal::Long(y)) => x.cmp(y),
        (Literal::BigInteger(x), Literal::BigInteger(y)) => x.cmp(y),
        (Literal::Float(x), Literal::Float(y)) => x.partial_cmp(y).ok_or("NaN comparison")?,
        (Literal::Double(x), Literal::Double(y)) => x.partial_cmp(y).ok_or("NaN comparison")?,
        (Literal::String(x), Literal::String(y)) => x.cmp(y),
        _ => return Err(format!("cannot compare {} with {}", a, b)),
    };
    Ok(ord)
}

fn int_op(op: BinOp, a: i128, b: i128) -> Eval<i128> {
    let out = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => a.checked_div(b),
        BinOp::Rem => a.checked_rem(b),
        _ => None,
    };
    out.ok_or_else(|| format!("arithmetic error in {} {} {}", a, op, b))
}

fn narrow<T: TryFrom<i128>>(v: i128) -> Eval<T> {
    T::try_from(v).map_err(|_| format!("overflow: {}", v))
}

/// Evaluate a binary operator over two values of the same numeric kind.
pub fn arith(op: BinOp, l: Value, r: Value) -> Eval<Value> {
    let (Value::Lit(l), Value::Lit(r)) = (l, r) else {
        return Err("arithmetic on non-scalars".to_string());
    };
    if op.is_comparison() {
        let ord = match (&l, &r) {
            (Literal::Bool(a), Literal::Bool(b)) => a.cmp(b),
            _ => compare(&l, &r)?,
        };
        return Ok(Value::bool(match op {
            BinOp::Eq => ord == Ordering::Equal,
            BinOp::Ne => ord != Ordering::Equal,
            BinOp::Lt => ord == Ordering::Less,
            BinOp::Le => ord != Ordering::Greater,
            BinOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        }));
    }
    let lit = match (l, r) {
        (Literal::Short(a), Literal::Short(b)) => Literal::Short(narrow(int_op(op, a.into(), b.into())?)?),
        (Literal::Int(a), Literal::Int(b)) => Literal::Int(narrow(int_op(op, a.into(), b.into())?)?),
        (Literal::Long(a), Literal::Long(b)) => Literal::Long(narrow(int_op(op, a.into(), b.into())?)?),
        (Literal::BigInteger(a), Literal::BigInteger(b)) => Literal::BigInteger(int_op(op, a, b)?),
        (Literal::Float(a), Literal::Float(b)) => Literal::Float(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            _ => a % b,
        }),
        (Literal::Double(a), Literal::Double(b)) => Literal::Double(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            _ => a % b,
        }),
        (l, r) => return Err(format!("mismatched operands {} {} {}", l, op, r)),
    };
    Ok(Value::Lit(lit))
}

// ── Fixtures ───────────────────────────────────────────────────────────

/// Ada (age 36) lives in London and has two friends, Bob (no address) and
/// Cy (Paris). Ada has two orders.
pub struct World {
    pub heap: Heap,
    pub ada: Value,
    pub bob: Value,
    pub cy: Value,
}

pub fn world() -> World {
    let mut heap = Heap::new();
    let london = heap.alloc("Address", vec![("city", Value::str("London")), ("zip", Value::int(1))]);
    let paris = heap.alloc("Address", vec![("city", Value::str("Paris")), ("zip", Value::int(75))]);
    let bob = heap.alloc("Person", vec![("name", Value::str("Bob")), ("age", Value::int(20))]);
    let cy = heap.alloc(
        "Person",
        vec![("name", Value::str("Cy")), ("age", Value::int(41)), ("address", paris)],
    );
    let line = |heap: &mut Heap, sku: &str, qty: i32| {
        heap.alloc("Line", vec![("sku", Value::str(sku)), ("qty", Value::int(qty))])
    };
    let l1 = line(&mut heap, "apple", 2);
    let l2 = line(&mut heap, "pear", 1);
    let l3 = line(&mut heap, "apple", 5);
    let o1 = heap.alloc(
        "Order",
        vec![("total", Value::Lit(Literal::Double(9.5))), ("lines", Value::List(vec![l1, l2]))],
    );
    let o2 = heap.alloc(
        "Order",
        vec![("total", Value::Lit(Literal::Double(3.0))), ("lines", Value::List(vec![l3]))],
    );
    let ada = heap.alloc(
        "Person",
        vec![
            ("name", Value::str("Ada")),
            ("age", Value::int(36)),
            ("address", london),
            ("friends", Value::List(vec![bob.clone(), cy.clone()])),
            ("orders", Value::List(vec![o1, o2])),
            ("greeting()", Value::str("hello")),
        ],
    );
    World { heap, ada, bob, cy }
}

/// Run `node` with `this` bound to `this`, returning the value and the
/// member access log.
pub fn execute(heap: &Heap, this: &Value, node: &Node) -> (Value, Vec<String>) {
    let mut machine = Machine::new(heap, this.clone());
    let value = machine.run(node).unwrap_or_else(|e| panic!("{}\nwhile running {}", e, node));
    (value, machine.reads)
}
