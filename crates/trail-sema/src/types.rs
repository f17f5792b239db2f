//! Class hierarchy and member lookup.
//!
//! Resolution never inspects runtime classes: everything it knows about a
//! type comes through [`TypeInfo`], implemented here by [`TypeTable`] and
//! populated from built-in declarations plus navigator manifests.

use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet};
use trail_syntax::{Ty, TyCon};

/// A method visible on a class.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

/// The declaration of a reference type.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub con: TyCon,
    /// Names of type parameters, substituted from the receiver's type
    /// arguments when members are looked up (`List<E>`).
    pub type_params: Vec<String>,
    /// `None` means `Object` (or nothing, for `Object` itself).
    pub superclass: Option<Ty>,
    pub interfaces: Vec<Ty>,
    pub properties: FxHashMap<String, Ty>,
    pub methods: Vec<MethodSig>,
}

impl ClassDecl {
    pub fn new(con: TyCon) -> Self {
        ClassDecl {
            con,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            properties: FxHashMap::default(),
            methods: Vec::new(),
        }
    }

    pub fn named(name: &str) -> Self {
        Self::new(TyCon::new(name))
    }

    pub fn params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extends(mut self, sup: Ty) -> Self {
        self.superclass = Some(sup);
        self
    }

    pub fn implements(mut self, iface: Ty) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn property(mut self, name: &str, ty: Ty) -> Self {
        self.properties.insert(name.to_string(), ty);
        self
    }

    pub fn method(mut self, name: &str, params: Vec<Ty>, ret: Ty) -> Self {
        self.methods.push(MethodSig { name: name.to_string(), params, ret });
        self
    }

    /// The type this declaration describes, with its own parameters as
    /// arguments.
    pub fn ty(&self) -> Ty {
        if self.type_params.is_empty() {
            Ty::Con(self.con.clone())
        } else {
            let args = self.type_params.iter().map(|p| Ty::con(p)).collect();
            Ty::App(self.con.clone(), args)
        }
    }
}

/// A member found by lookup: the declaring type and the member's type with
/// the receiver's type arguments substituted in.
#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub owner: Ty,
    pub ty: Ty,
}

/// The key a type is registered under: the constructor name for reference
/// types, `[]` for every array type.
pub fn type_key(ty: &Ty) -> String {
    match ty {
        Ty::Prim(kind) => kind.name().to_string(),
        Ty::Con(con) | Ty::App(con, _) => con.name.clone(),
        Ty::Array(_) => "[]".to_string(),
        Ty::Null => "null".to_string(),
    }
}

/// Read access to the class hierarchy.
pub trait TypeInfo: Send + Sync {
    /// The declaration of a class by simple name.
    fn class(&self, name: &str) -> Option<&ClassDecl>;

    /// Immediate supertypes. Every reference type other than `Object` has
    /// `Object` above it; arrays sit directly under `Object`.
    fn direct_supertypes(&self, ty: &Ty) -> Vec<Ty> {
        match ty {
            Ty::Prim(_) | Ty::Null => Vec::new(),
            Ty::Array(_) => vec![Ty::object()],
            Ty::Con(con) | Ty::App(con, _) => {
                if con.name == "Object" {
                    return Vec::new();
                }
                match self.class(&con.name) {
                    Some(decl) => {
                        let mut out = Vec::with_capacity(decl.interfaces.len() + 1);
                        out.push(decl.superclass.clone().unwrap_or_else(Ty::object));
                        out.extend(decl.interfaces.iter().cloned());
                        out
                    }
                    None => vec![Ty::object()],
                }
            }
        }
    }

    /// Every supertype of `ty`, `ty` included, in post-order: a type's
    /// supertypes are emitted before the type itself and each type appears
    /// once. The most general type comes first, `ty` last.
    fn supertype_walk(&self, ty: &Ty) -> Vec<Ty> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        walk_into(self, ty, &mut out, &mut seen);
        out
    }

    /// A property by name, searching from `ty` up.
    fn property(&self, ty: &Ty, name: &str) -> Option<Member> {
        self.supertype_walk(ty).iter().rev().find_map(|owner| {
            let decl = self.class(owner.con_name()?)?;
            let prop = decl.properties.get(name)?;
            Some(Member { owner: owner.clone(), ty: substitute(prop, decl, ty) })
        })
    }

    /// A method by name and argument count, searching from `ty` up.
    fn method(&self, ty: &Ty, name: &str, arity: usize) -> Option<Member> {
        self.supertype_walk(ty).iter().rev().find_map(|owner| {
            let decl = self.class(owner.con_name()?)?;
            let sig = decl
                .methods
                .iter()
                .find(|m| m.name == name && m.params.len() == arity)?;
            Some(Member { owner: owner.clone(), ty: substitute(&sig.ret, decl, ty) })
        })
    }

    /// Reference subtyping. Type arguments are ignored; `null` is below
    /// every reference type; primitives are only related to themselves.
    fn is_subtype(&self, sub: &Ty, sup: &Ty) -> bool {
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (Ty::Null, sup) => sup.is_reference() && *sup != Ty::Null,
            (Ty::Array(a), Ty::Array(b)) => {
                a.is_reference() && b.is_reference() && self.is_subtype(a, b)
            }
            _ if sub.is_primitive() || sup.is_primitive() => false,
            _ => {
                let key = type_key(sup);
                self.supertype_walk(sub).iter().any(|t| type_key(t) == key)
            }
        }
    }
}

fn walk_into<T: TypeInfo + ?Sized>(
    types: &T,
    ty: &Ty,
    out: &mut Vec<Ty>,
    seen: &mut FxHashSet<String>,
) {
    if !seen.insert(type_key(ty)) {
        return;
    }
    for sup in types.direct_supertypes(ty) {
        walk_into(types, &sup, out, seen);
    }
    out.push(ty.clone());
}

/// Replace the declaring class's type parameters in `member` with the
/// receiver's type arguments, when the receiver is an application of that
/// same class.
fn substitute(member: &Ty, decl: &ClassDecl, receiver: &Ty) -> Ty {
    let args = match receiver {
        Ty::App(con, args) if *con == decl.con && args.len() == decl.type_params.len() => args,
        _ => return member.clone(),
    };
    subst(member, &decl.type_params, args)
}

fn subst(ty: &Ty, params: &[String], args: &[Ty]) -> Ty {
    match ty {
        Ty::Con(con) => params
            .iter()
            .position(|p| *p == con.name)
            .map_or_else(|| ty.clone(), |i| args[i].clone()),
        Ty::App(con, inner) => {
            Ty::App(con.clone(), inner.iter().map(|t| subst(t, params, args)).collect())
        }
        Ty::Array(elem) => Ty::array(subst(elem, params, args)),
        Ty::Prim(_) | Ty::Null => ty.clone(),
    }
}

/// A mutable class table.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    classes: FxHashMap<String, ClassDecl>,
}

impl TypeTable {
    /// An empty table; `Object` is still implicitly the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table preloaded with the standard library classes.
    pub fn with_builtins() -> Self {
        let mut table = TypeTable::new();
        register_builtins(&mut table);
        table
    }

    /// The shared built-in table.
    pub fn builtins() -> &'static TypeTable {
        static BUILTINS: OnceLock<TypeTable> = OnceLock::new();
        BUILTINS.get_or_init(TypeTable::with_builtins)
    }

    /// Add or replace a class declaration.
    pub fn add(&mut self, decl: ClassDecl) {
        self.classes.insert(decl.con.name.clone(), decl);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TypeInfo for TypeTable {
    fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.get(name)
    }
}

fn register_builtins(table: &mut TypeTable) {
    let comparable = Ty::con("Comparable");
    let number = Ty::con("Number");
    let e = || Ty::con("E");

    table.add(ClassDecl::named("Object"));
    table.add(ClassDecl::named("Comparable"));
    table.add(ClassDecl::named("CharSequence").method("length", vec![], Ty::int()));
    table.add(
        ClassDecl::new(TyCon::with_package("String", "lang"))
            .implements(Ty::con("CharSequence"))
            .implements(comparable.clone())
            .method("length", vec![], Ty::int())
            .method("isEmpty", vec![], Ty::boolean())
            .method("toUpperCase", vec![], Ty::string()),
    );
    table.add(ClassDecl::named("Number").method("doubleValue", vec![], Ty::double()));
    for name in ["Short", "Integer", "Long", "Float", "Double", "BigInteger", "BigDecimal"] {
        table.add(
            ClassDecl::named(name)
                .extends(number.clone())
                .implements(comparable.clone()),
        );
    }
    table.add(ClassDecl::named("Boolean").implements(comparable.clone()));
    table.add(ClassDecl::named("Character").implements(comparable));
    table.add(ClassDecl::named("Class").params(&["T"]).method("getName", vec![], Ty::string()));

    table.add(ClassDecl::named("Iterable").params(&["E"]));
    table.add(
        ClassDecl::named("Collection")
            .params(&["E"])
            .implements(Ty::App(TyCon::new("Iterable"), vec![e()]))
            .method("size", vec![], Ty::int())
            .method("isEmpty", vec![], Ty::boolean()),
    );
    table.add(
        ClassDecl::named("List")
            .params(&["E"])
            .implements(Ty::App(TyCon::new("Collection"), vec![e()]))
            .method("get", vec![Ty::int()], e()),
    );
    table.add(
        ClassDecl::named("Set")
            .params(&["E"])
            .implements(Ty::App(TyCon::new("Collection"), vec![e()])),
    );
    table.add(ClassDecl::named("Stream").params(&["E"]).method("count", vec![], Ty::long()));
}
