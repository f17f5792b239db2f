//! Operator overload registry.
//!
//! Maps (operator, left type, right type) to the static method implementing
//! it. The table is built from its providers on first use and is read-only
//! afterwards, so lookups from concurrent compilations need no locking.

use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;
use tracing::debug;
use trail_syntax::{BinOp, Ty};

use crate::types::{type_key, TypeInfo};

/// How an operator implementation's result type is determined.
#[derive(Clone, Debug, PartialEq)]
pub enum OperatorReturn {
    Fixed(Ty),
    /// The (boxed) type of the left operand.
    Left,
}

/// A static method implementing a binary operator.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorImpl {
    pub op: BinOp,
    /// The class declaring the implementing method.
    pub owner: Ty,
    pub method: String,
    pub left: Ty,
    pub right: Ty,
    pub returns: OperatorReturn,
}

impl OperatorImpl {
    pub fn new(op: BinOp, owner: &str, method: &str, left: Ty, right: Ty, returns: OperatorReturn) -> Self {
        OperatorImpl {
            op,
            owner: Ty::con(owner),
            method: method.to_string(),
            left,
            right,
            returns,
        }
    }

    /// The result type for a call whose left operand has type `left`.
    pub fn return_ty(&self, left: &Ty) -> Ty {
        match &self.returns {
            OperatorReturn::Fixed(ty) => ty.clone(),
            OperatorReturn::Left => left.boxed(),
        }
    }
}

impl fmt::Display for OperatorImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({}, {})", self.owner, self.method, self.left, self.right)
    }
}

/// A source of operator implementations.
pub trait OperatorProvider: Send + Sync {
    fn name(&self) -> &str;
    fn operators(&self) -> Vec<OperatorImpl>;
}

/// String concatenation, elvis, type tests, and the comparison and equality
/// operators on reference types.
pub struct StandardOperators;

impl OperatorProvider for StandardOperators {
    fn name(&self) -> &str {
        "standard"
    }

    fn operators(&self) -> Vec<OperatorImpl> {
        let object = Ty::object;
        let comparable = || Ty::con("Comparable");
        let boolean = || OperatorReturn::Fixed(Ty::boolean());
        let mut ops = vec![
            OperatorImpl::new(BinOp::Add, "Strings", "concat", Ty::string(), object(), OperatorReturn::Fixed(Ty::string())),
            OperatorImpl::new(BinOp::Add, "Strings", "concat", object(), Ty::string(), OperatorReturn::Fixed(Ty::string())),
            OperatorImpl::new(BinOp::Elvis, "Operators", "elvis", object(), object(), OperatorReturn::Left),
            OperatorImpl::new(BinOp::InstanceOf, "Operators", "isInstance", object(), Ty::class(), boolean()),
            OperatorImpl::new(BinOp::Eq, "Operators", "equals", object(), object(), boolean()),
            OperatorImpl::new(BinOp::Ne, "Operators", "notEquals", object(), object(), boolean()),
        ];
        for (op, method) in [
            (BinOp::Lt, "lessThan"),
            (BinOp::Le, "lessOrEqual"),
            (BinOp::Gt, "greaterThan"),
            (BinOp::Ge, "greaterOrEqual"),
        ] {
            ops.push(OperatorImpl::new(op, "Operators", method, comparable(), comparable(), boolean()));
        }
        ops
    }
}

type OperatorKey = (BinOp, String, String);

/// Operator implementations keyed by operator and operand types.
pub struct OperatorRegistry {
    providers: Vec<Box<dyn OperatorProvider>>,
    table: OnceLock<FxHashMap<OperatorKey, OperatorImpl>>,
}

impl OperatorRegistry {
    /// A registry that loads `providers`, in order, on first lookup.
    pub fn new(providers: Vec<Box<dyn OperatorProvider>>) -> Self {
        OperatorRegistry { providers, table: OnceLock::new() }
    }

    pub fn standard() -> Self {
        Self::new(vec![Box::new(StandardOperators)])
    }

    /// The process-wide registry with the standard operators.
    pub fn global() -> &'static OperatorRegistry {
        static GLOBAL: OnceLock<OperatorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(OperatorRegistry::standard)
    }

    fn table(&self) -> &FxHashMap<OperatorKey, OperatorImpl> {
        self.table.get_or_init(|| {
            let mut table = FxHashMap::default();
            for provider in &self.providers {
                for imp in provider.operators() {
                    let key = (imp.op, type_key(&imp.left), type_key(&imp.right));
                    if let Some(existing) = table.get(&key) {
                        debug!(kept = %existing, dropped = %imp, "operator already registered");
                        continue;
                    }
                    table.insert(key, imp);
                }
                debug!(provider = provider.name(), "operators loaded");
            }
            table
        })
    }

    /// The implementation for `left op right`, trying the most specific
    /// operand types first: the left operand's supertypes are walked from
    /// the type itself upwards, and for each of them the right operand's.
    /// A `null` operand matches like `Object`.
    pub fn lookup(&self, op: BinOp, left: &Ty, right: &Ty, types: &dyn TypeInfo) -> Option<&OperatorImpl> {
        let table = self.table();
        let walk = |ty: &Ty| match ty {
            Ty::Null => types.supertype_walk(&Ty::object()),
            ty => types.supertype_walk(ty),
        };
        let lefts = walk(left);
        let rights = walk(right);
        for l in lefts.iter().rev() {
            let lk = type_key(l);
            for r in rights.iter().rev() {
                if let Some(imp) = table.get(&(op, lk.clone(), type_key(r))) {
                    return Some(imp);
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}
