//! Type representation for Trail.
//!
//! Defines the resolved-type enum `Ty`, named reference types (`TyCon`),
//! primitive kinds and the numeric-kind lattice used by widening. Types are
//! plain values: the class hierarchy behind a `TyCon` lives in the type
//! table of the semantic crate, not here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A primitive (unboxed) value kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimKind::Boolean => "boolean",
            PrimKind::Byte => "byte",
            PrimKind::Char => "char",
            PrimKind::Short => "short",
            PrimKind::Int => "int",
            PrimKind::Long => "long",
            PrimKind::Float => "float",
            PrimKind::Double => "double",
            PrimKind::Void => "void",
        }
    }

    /// Name of the reference type a value of this kind boxes into.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimKind::Boolean => "Boolean",
            PrimKind::Byte => "Byte",
            PrimKind::Char => "Character",
            PrimKind::Short => "Short",
            PrimKind::Int => "Integer",
            PrimKind::Long => "Long",
            PrimKind::Float => "Float",
            PrimKind::Double => "Double",
            PrimKind::Void => "Void",
        }
    }

    fn from_boxed_name(name: &str) -> Option<PrimKind> {
        Some(match name {
            "Boolean" => PrimKind::Boolean,
            "Byte" => PrimKind::Byte,
            "Character" => PrimKind::Char,
            "Short" => PrimKind::Short,
            "Integer" => PrimKind::Int,
            "Long" => PrimKind::Long,
            "Float" => PrimKind::Float,
            "Double" => PrimKind::Double,
            _ => return None,
        })
    }
}

/// A named reference type such as `String`, `Person` or `List`.
///
/// The `package` field is used ONLY for display (e.g. `util.List`). It is
/// excluded from `PartialEq` and `Hash` so imports and simple names refer to
/// the same type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TyCon {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl PartialEq for TyCon {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TyCon {}

impl std::hash::Hash for TyCon {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into(), package: None }
    }

    pub fn with_package(name: impl Into<String>, package: impl Into<String>) -> Self {
        TyCon { name: name.into(), package: Some(package.into()) }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{}.{}", package, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A Trail type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    /// An unboxed primitive.
    Prim(PrimKind),
    /// A reference type without type arguments.
    Con(TyCon),
    /// A parameterised reference type: `List<String>`, `Class<Person>`.
    App(TyCon, Vec<Ty>),
    /// An array of the element type.
    Array(Box<Ty>),
    /// The type of the `null` literal; assignable to every reference type.
    Null,
}

/// Constructors of parameterised types that hold many values.
const MULTI_VALUED: &[&str] = &["List", "Set", "Collection", "Iterable", "Stream"];

impl Ty {
    pub fn boolean() -> Ty {
        Ty::Prim(PrimKind::Boolean)
    }

    pub fn short() -> Ty {
        Ty::Prim(PrimKind::Short)
    }

    pub fn int() -> Ty {
        Ty::Prim(PrimKind::Int)
    }

    pub fn long() -> Ty {
        Ty::Prim(PrimKind::Long)
    }

    pub fn float() -> Ty {
        Ty::Prim(PrimKind::Float)
    }

    pub fn double() -> Ty {
        Ty::Prim(PrimKind::Double)
    }

    pub fn void() -> Ty {
        Ty::Prim(PrimKind::Void)
    }

    /// A named reference type.
    pub fn con(name: &str) -> Ty {
        Ty::Con(TyCon::new(name))
    }

    pub fn object() -> Ty {
        Ty::con("Object")
    }

    pub fn string() -> Ty {
        Ty::con("String")
    }

    pub fn big_integer() -> Ty {
        Ty::con("BigInteger")
    }

    pub fn big_decimal() -> Ty {
        Ty::con("BigDecimal")
    }

    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::App(TyCon::new("List"), vec![elem])
    }

    pub fn set(elem: Ty) -> Ty {
        Ty::App(TyCon::new("Set"), vec![elem])
    }

    pub fn stream(elem: Ty) -> Ty {
        Ty::App(TyCon::new("Stream"), vec![elem])
    }

    /// The meta-type `Class<T>`.
    pub fn class_of(ty: Ty) -> Ty {
        Ty::App(TyCon::new("Class"), vec![ty])
    }

    /// The raw meta-type `Class`, used for the right operand of type tests.
    pub fn class() -> Ty {
        Ty::con("Class")
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Ty::Prim(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Prim(PrimKind::Void))
    }

    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    /// The named constructor of a reference type, if it has one.
    pub fn con_name(&self) -> Option<&str> {
        match self {
            Ty::Con(con) | Ty::App(con, _) => Some(&con.name),
            _ => None,
        }
    }

    /// Box a primitive into its reference type; other types are returned as is.
    pub fn boxed(&self) -> Ty {
        match self {
            Ty::Prim(kind) => Ty::con(kind.boxed_name()),
            other => other.clone(),
        }
    }

    /// The primitive a boxed reference type unboxes to.
    pub fn unboxed(&self) -> Option<Ty> {
        match self {
            Ty::Con(con) => PrimKind::from_boxed_name(&con.name).map(Ty::Prim),
            _ => None,
        }
    }

    /// Whether a value of this type holds many values (arrays and the
    /// collection/stream constructors).
    pub fn is_multi_valued(&self) -> bool {
        match self {
            Ty::Array(_) => true,
            Ty::App(con, args) => args.len() == 1 && MULTI_VALUED.contains(&con.name.as_str()),
            _ => false,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Ty::App(con, _) if con.name == "Stream")
    }

    /// The element type of a multi-valued type.
    pub fn element_type(&self) -> Option<&Ty> {
        match self {
            Ty::Array(elem) => Some(elem),
            Ty::App(_, args) if self.is_multi_valued() => args.first(),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Prim(kind) => write!(f, "{}", kind.name()),
            Ty::Con(con) => write!(f, "{}", con),
            Ty::App(con, args) => {
                write!(f, "{}<", con)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ">")
            }
            Ty::Array(elem) => write!(f, "{}[]", elem),
            Ty::Null => write!(f, "null"),
        }
    }
}

/// A malformed type name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseTyError(pub String);

impl fmt::Display for ParseTyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed type name `{}`", self.0)
    }
}

impl std::error::Error for ParseTyError {}

/// Parses the display form back: `int`, `model.Person`, `Person[]`,
/// `Map<String, List<Integer>>`.
impl FromStr for Ty {
    type Err = ParseTyError;

    fn from_str(s: &str) -> Result<Ty, ParseTyError> {
        let mut parser = TyParser { src: s, pos: 0 };
        let ty = parser.ty().ok_or_else(|| ParseTyError(s.to_string()))?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(ParseTyError(s.to_string()));
        }
        Ok(ty)
    }
}

struct TyParser<'a> {
    src: &'a str,
    pos: usize,
}

impl TyParser<'_> {
    fn skip_ws(&mut self) {
        while self.src[self.pos..].starts_with(' ') {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&str> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '$'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn ty(&mut self) -> Option<Ty> {
        let path = self.ident()?.to_string();
        let mut ty = match prim_from_name(&path) {
            Some(kind) => Ty::Prim(kind),
            None if path == "null" => Ty::Null,
            None => {
                let con = match path.rsplit_once('.') {
                    Some((package, name)) => TyCon::with_package(name, package),
                    None => TyCon::new(path),
                };
                if self.eat("<") {
                    let mut args = vec![self.ty()?];
                    while self.eat(",") {
                        args.push(self.ty()?);
                    }
                    if !self.eat(">") {
                        return None;
                    }
                    Ty::App(con, args)
                } else {
                    Ty::Con(con)
                }
            }
        };
        while self.eat("[]") {
            ty = Ty::array(ty);
        }
        Some(ty)
    }
}

fn prim_from_name(name: &str) -> Option<PrimKind> {
    Some(match name {
        "boolean" => PrimKind::Boolean,
        "byte" => PrimKind::Byte,
        "char" => PrimKind::Char,
        "short" => PrimKind::Short,
        "int" => PrimKind::Int,
        "long" => PrimKind::Long,
        "float" => PrimKind::Float,
        "double" => PrimKind::Double,
        "void" => PrimKind::Void,
        _ => return None,
    })
}

/// A member of the numeric promotion lattice.
///
/// Declaration order is widening order within each family; the promotion
/// table in the semantic crate is the authority on mixed pairs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumKind {
    Short,
    Int,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
}

impl NumKind {
    pub const ALL: [NumKind; 7] = [
        NumKind::Short,
        NumKind::Int,
        NumKind::Long,
        NumKind::BigInteger,
        NumKind::Float,
        NumKind::Double,
        NumKind::BigDecimal,
    ];

    /// Lattice membership of a resolved type. Boxed numerics are not members
    /// themselves; callers unbox them first.
    pub fn of(ty: &Ty) -> Option<NumKind> {
        match ty {
            Ty::Prim(PrimKind::Short) => Some(NumKind::Short),
            Ty::Prim(PrimKind::Int) => Some(NumKind::Int),
            Ty::Prim(PrimKind::Long) => Some(NumKind::Long),
            Ty::Prim(PrimKind::Float) => Some(NumKind::Float),
            Ty::Prim(PrimKind::Double) => Some(NumKind::Double),
            Ty::Con(con) if con.name == "BigInteger" => Some(NumKind::BigInteger),
            Ty::Con(con) if con.name == "BigDecimal" => Some(NumKind::BigDecimal),
            _ => None,
        }
    }

    pub fn ty(self) -> Ty {
        match self {
            NumKind::Short => Ty::short(),
            NumKind::Int => Ty::int(),
            NumKind::Long => Ty::long(),
            NumKind::BigInteger => Ty::big_integer(),
            NumKind::Float => Ty::float(),
            NumKind::Double => Ty::double(),
            NumKind::BigDecimal => Ty::big_decimal(),
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            NumKind::Short | NumKind::Int | NumKind::Long | NumKind::BigInteger
        )
    }
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Ty::array(Ty::con("Person")).to_string(), "Person[]");
        assert_eq!(Ty::list(Ty::string()).to_string(), "List<String>");
        assert_eq!(Ty::class_of(Ty::int()).to_string(), "Class<int>");
        assert_eq!(
            Ty::Con(TyCon::with_package("Person", "model")).to_string(),
            "model.Person"
        );
    }

    #[test]
    fn package_excluded_from_identity() {
        assert_eq!(Ty::Con(TyCon::with_package("Person", "model")), Ty::con("Person"));
    }

    #[test]
    fn boxing_round_trip() {
        assert_eq!(Ty::int().boxed(), Ty::con("Integer"));
        assert_eq!(Ty::con("Integer").unboxed(), Some(Ty::int()));
        assert_eq!(Ty::string().boxed(), Ty::string());
        assert_eq!(Ty::string().unboxed(), None);
    }

    #[test]
    fn multi_valued_types() {
        assert!(Ty::array(Ty::int()).is_multi_valued());
        assert!(Ty::list(Ty::string()).is_multi_valued());
        assert!(Ty::stream(Ty::string()).is_multi_valued());
        assert!(!Ty::class_of(Ty::string()).is_multi_valued());
        assert!(!Ty::string().is_multi_valued());
        assert_eq!(Ty::set(Ty::int()).element_type(), Some(&Ty::int()));
    }

    #[test]
    fn parse_type_names() {
        assert_eq!("int".parse::<Ty>(), Ok(Ty::int()));
        assert_eq!("Person[]".parse::<Ty>(), Ok(Ty::array(Ty::con("Person"))));
        assert_eq!("List<String>".parse::<Ty>(), Ok(Ty::list(Ty::string())));
        let qualified: Ty = "model.Person".parse().unwrap();
        assert_eq!(qualified.to_string(), "model.Person");
        assert_eq!(
            "Map<String, int[]>".parse::<Ty>(),
            Ok(Ty::App(TyCon::new("Map"), vec![Ty::string(), Ty::array(Ty::int())]))
        );
        assert!("List<".parse::<Ty>().is_err());
        assert!("".parse::<Ty>().is_err());
    }

    #[test]
    fn numeric_membership() {
        assert_eq!(NumKind::of(&Ty::int()), Some(NumKind::Int));
        assert_eq!(NumKind::of(&Ty::big_decimal()), Some(NumKind::BigDecimal));
        assert_eq!(NumKind::of(&Ty::con("Integer")), None);
        assert_eq!(NumKind::of(&Ty::boolean()), None);
    }
}
