//! Navigator providers.
//!
//! - [`StandardNavigators`]: identity on `self::node()` and reflective
//!   member access through [`TypeInfo`], registered on `Object` so every
//!   reference type inherits them.
//! - [`StaticProvider`]: registrations assembled in code by an embedder.
//! - [`Manifest`]: classes and navigator aliases declared in TOML.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use trail_syntax::{Axis, Node, NodeKind, Ty, TyCon};

use crate::config::{self, ConfigError};
use crate::navigators::{NavRequest, Navigator, NavigatorProvider, Registration, TestKey};
use crate::types::{ClassDecl, MethodSig, TypeInfo, TypeTable};

// ── Standard ───────────────────────────────────────────────────────────

/// Navigators every registry starts with.
pub struct StandardNavigators;

impl NavigatorProvider for StandardNavigators {
    fn name(&self) -> &str {
        "standard"
    }

    fn registrations(&self) -> Vec<Registration> {
        vec![
            Registration {
                declaring: Ty::object(),
                axes: vec![Axis::SelfAxis],
                tests: vec![TestKey::SelfTest],
                navigator: Navigator::new("identity", identity),
            },
            Registration {
                declaring: Ty::object(),
                axes: vec![Axis::Child, Axis::Attribute],
                tests: vec![TestKey::AnyName],
                navigator: Navigator::new("reflect-property", reflect_property),
            },
            Registration {
                declaring: Ty::object(),
                axes: vec![Axis::Child],
                tests: vec![TestKey::AnyCall],
                navigator: Navigator::new("reflect-method", reflect_method),
            },
        ]
    }
}

/// `self::node()` is the receiver itself.
fn identity(req: &NavRequest<'_>) -> Option<Node> {
    Some(req.receiver.clone().typed(req.receiver_ty.clone()))
}

fn reflect_property(req: &NavRequest<'_>) -> Option<Node> {
    let name = req.member()?;
    let member = req.types.property(req.receiver_ty, name)?;
    Some(property_read(req, name, member.ty))
}

fn reflect_method(req: &NavRequest<'_>) -> Option<Node> {
    let name = req.member()?;
    let member = req.types.method(req.receiver_ty, name, req.args().len())?;
    Some(method_call(req, member.owner, name, member.ty))
}

fn property_read(req: &NavRequest<'_>, name: &str, ty: Ty) -> Node {
    Node::new(NodeKind::PropertyRead {
        target: Box::new(req.receiver.clone()),
        name: name.to_string(),
    })
    .at(req.step.span.clone())
    .typed(ty)
}

fn method_call(req: &NavRequest<'_>, owner: Ty, name: &str, ret: Ty) -> Node {
    Node::new(NodeKind::MethodCall {
        target: Box::new(req.receiver.clone()),
        owner,
        name: name.to_string(),
        args: req.args().to_vec(),
    })
    .at(req.step.span.clone())
    .typed(ret)
}

// ── Static ─────────────────────────────────────────────────────────────

/// A fixed list of registrations.
pub struct StaticProvider {
    name: String,
    registrations: Vec<Registration>,
}

impl StaticProvider {
    pub fn new(name: &str) -> Self {
        StaticProvider { name: name.to_string(), registrations: Vec::new() }
    }

    pub fn with(mut self, declaring: Ty, axes: &[Axis], tests: &[&str], navigator: Navigator) -> Self {
        self.registrations.push(Registration {
            declaring,
            axes: axes.to_vec(),
            tests: tests.iter().map(|t| TestKey::parse(t)).collect(),
            navigator,
        });
        self
    }
}

impl NavigatorProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn registrations(&self) -> Vec<Registration> {
        self.registrations.clone()
    }
}

// ── Manifest ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    #[serde(default, rename = "class")]
    classes: Vec<RawClass>,
    #[serde(default, rename = "navigator")]
    navigators: Vec<RawNavigator>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClass {
    name: String,
    package: Option<String>,
    #[serde(default)]
    params: Vec<String>,
    extends: Option<String>,
    #[serde(default)]
    implements: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    methods: Vec<RawMethod>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMethod {
    name: String,
    #[serde(default)]
    params: Vec<String>,
    returns: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNavigator {
    #[serde(rename = "type")]
    declaring: String,
    #[serde(default = "default_axes")]
    axes: Vec<String>,
    tests: Vec<String>,
    /// Resolve to a read of this property.
    property: Option<String>,
    /// Resolve to a call of this method, passing the step's arguments.
    method: Option<String>,
}

fn default_axes() -> Vec<String> {
    vec!["child".to_string()]
}

/// Classes and navigator aliases loaded from a TOML manifest.
///
/// ```toml
/// [[class]]
/// name = "Person"
/// package = "model"
/// properties = { name = "String", friends = "Person[]" }
/// methods = [{ name = "fullName", returns = "String" }]
///
/// [[navigator]]
/// type = "Person"
/// tests = ["display"]
/// method = "fullName"
/// ```
pub struct Manifest {
    name: String,
    classes: Vec<ClassDecl>,
    registrations: Vec<Registration>,
}

impl Manifest {
    pub fn from_toml_str(name: &str, src: &str) -> Result<Self, ConfigError> {
        let raw: RawManifest = toml::from_str(src)?;

        let classes = raw
            .classes
            .into_iter()
            .map(class_decl)
            .collect::<Result<Vec<_>, _>>()?;

        let mut registrations = Vec::with_capacity(raw.navigators.len());
        for nav in raw.navigators {
            let known = classes.iter().any(|c| c.con.name == nav.declaring)
                || TypeTable::builtins().contains(&nav.declaring);
            if !known {
                return Err(ConfigError::UnknownClass {
                    class: nav.declaring,
                    context: format!("manifest `{}`", name),
                });
            }
            registrations.push(alias_registration(name, nav)?);
        }

        Ok(Manifest { name: name.to_string(), classes, registrations })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = config::read(path)?;
        Self::from_toml_str(&path.display().to_string(), &src)
    }

    /// Add the manifest's classes to `table`.
    pub fn install_types(&self, table: &mut TypeTable) {
        for decl in &self.classes {
            table.add(decl.clone());
        }
    }

    pub fn classes(&self) -> &[ClassDecl] {
        &self.classes
    }
}

impl NavigatorProvider for Manifest {
    fn name(&self) -> &str {
        &self.name
    }

    fn registrations(&self) -> Vec<Registration> {
        self.registrations.clone()
    }
}

fn parse_ty(text: &str) -> Result<Ty, ConfigError> {
    text.parse().map_err(|_| ConfigError::BadType(text.to_string()))
}

fn class_decl(raw: RawClass) -> Result<ClassDecl, ConfigError> {
    let con = match raw.package {
        Some(package) => TyCon::with_package(raw.name, package),
        None => TyCon::new(raw.name),
    };
    let mut decl = ClassDecl::new(con);
    decl.type_params = raw.params;
    decl.superclass = raw.extends.as_deref().map(parse_ty).transpose()?;
    for iface in &raw.implements {
        decl.interfaces.push(parse_ty(iface)?);
    }
    for (name, ty) in &raw.properties {
        decl.properties.insert(name.clone(), parse_ty(ty)?);
    }
    for m in raw.methods {
        let params = m.params.iter().map(|p| parse_ty(p)).collect::<Result<_, _>>()?;
        decl.methods.push(MethodSig { name: m.name, params, ret: parse_ty(&m.returns)? });
    }
    Ok(decl)
}

fn alias_registration(manifest: &str, raw: RawNavigator) -> Result<Registration, ConfigError> {
    let bad = |reason: &str| ConfigError::BadNavigator {
        declaring: raw.declaring.clone(),
        reason: reason.to_string(),
    };
    if raw.tests.is_empty() {
        return Err(bad("no tests given"));
    }
    let navigator = match (&raw.property, &raw.method) {
        (Some(property), None) => {
            let property = property.clone();
            Navigator::new(&format!("{}:{}", manifest, property), move |req| {
                let member = req.types.property(req.receiver_ty, &property)?;
                Some(property_read(req, &property, member.ty))
            })
        }
        (None, Some(method)) => {
            let method = method.clone();
            Navigator::new(&format!("{}:{}()", manifest, method), move |req| {
                let member = req.types.method(req.receiver_ty, &method, req.args().len())?;
                Some(method_call(req, member.owner, &method, member.ty))
            })
        }
        _ => return Err(bad("exactly one of `property` or `method` is required")),
    };
    Ok(Registration {
        declaring: Ty::con(&raw.declaring),
        axes: raw.axes.iter().map(|a| Axis::from_name(a)).collect(),
        tests: raw.tests.iter().map(|t| TestKey::parse(t)).collect(),
        navigator,
    })
}
