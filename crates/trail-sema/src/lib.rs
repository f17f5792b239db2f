//! Trail semantic analysis.
//!
//! Takes the syntax tree the front end produces and rewrites it into a
//! resolved tree: navigation streams become property reads, method calls
//! and stream pipelines; binary expressions become operator calls or get
//! explicit numeric conversions; method bodies are checked against their
//! declared return types. Problems are collected as diagnostics rather than
//! raised.
//!
//! # Architecture
//!
//! - [`types`]: the class hierarchy seen through [`types::TypeInfo`]
//! - [`navigators`]: the navigator registry keyed by (type, axis, test)
//! - [`providers`]: built-in, static and manifest navigator sources
//! - [`operators`]: the operator registry
//! - [`scope`]: the scope chain consulted for every step
//! - [`pass`]: the pass trait and the standard pipeline
//! - [`navigation`], [`binary`], [`widening`], [`returns`], [`report`]: the passes
//! - [`error`], [`diagnostics`]: diagnostics and their rendering
//! - [`config`]: analysis options

pub mod binary;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod navigation;
pub mod navigators;
pub mod operators;
pub mod pass;
pub mod providers;
pub mod report;
pub mod returns;
pub mod scope;
pub mod types;
pub mod widening;

use serde::{Deserialize, Deserializer};
use tracing::{info, instrument};
use trail_common::InternalError;
use trail_syntax::{Node, Ty, TyCon};

use crate::config::SemaConfig;
use crate::diagnostics::DiagnosticOptions;
use crate::error::Diagnostics;
use crate::navigators::NavigatorRegistry;
use crate::operators::OperatorRegistry;
use crate::pass::{Context, Pipeline};
use crate::types::{TypeInfo, TypeTable};

/// What a compilation unit is evaluated against.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitEnv {
    /// Type of the ambient binding (`this`).
    #[serde(default = "Ty::object", deserialize_with = "ty_from_str")]
    pub binding: Ty,
    /// The type whose members the unit sees unqualified, if any.
    #[serde(default, deserialize_with = "opt_ty_from_str")]
    pub enclosing: Option<Ty>,
    /// Types usable by simple name.
    #[serde(default, deserialize_with = "cons_from_str")]
    pub imports: Vec<TyCon>,
}

impl Default for UnitEnv {
    fn default() -> Self {
        UnitEnv { binding: Ty::object(), enclosing: None, imports: Vec::new() }
    }
}

/// A syntax tree plus its environment, as handed over by the front end.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CompilationUnit {
    #[serde(flatten)]
    pub env: UnitEnv,
    /// Source text the tree's spans point into, for rendering diagnostics.
    #[serde(default)]
    pub source: Option<String>,
    pub root: Node,
}

impl CompilationUnit {
    pub fn new(root: Node) -> Self {
        CompilationUnit { env: UnitEnv::default(), source: None, root }
    }

    pub fn with_env(mut self, env: UnitEnv) -> Self {
        self.env = env;
        self
    }
}

fn ty_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<Ty, D::Error> {
    let text = String::deserialize(d)?;
    text.parse().map_err(serde::de::Error::custom)
}

fn opt_ty_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Ty>, D::Error> {
    Ok(Some(ty_from_str(d)?))
}

fn cons_from_str<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TyCon>, D::Error> {
    Vec::<String>::deserialize(d)?
        .into_iter()
        .map(|text| match text.parse::<Ty>() {
            Ok(Ty::Con(con)) => Ok(con),
            _ => Err(serde::de::Error::custom(format!("`{}` is not an importable type", text))),
        })
        .collect()
}

/// The outcome of analysing one compilation unit.
#[derive(Clone, Debug)]
pub struct SemaResult {
    /// The resolved tree.
    pub root: Node,
    pub diagnostics: Diagnostics,
}

impl SemaResult {
    /// Whether code may be generated from the tree: no error-level
    /// diagnostic was recorded. Warnings do not block.
    pub fn can_emit(&self) -> bool {
        !self.diagnostics.has_errors()
    }

    /// Render every diagnostic against `source`.
    pub fn render_errors(&self, source: &str, filename: &str, opts: &DiagnosticOptions) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|d| diagnostics::render_diagnostic(d, source, filename, opts))
            .collect()
    }
}

/// Runs the standard pipeline against a fixed set of collaborators.
pub struct Analyzer<'a> {
    types: &'a dyn TypeInfo,
    navigators: &'a NavigatorRegistry,
    operators: &'a OperatorRegistry,
    config: SemaConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(types: &'a dyn TypeInfo, navigators: &'a NavigatorRegistry, operators: &'a OperatorRegistry) -> Self {
        Analyzer { types, navigators, operators, config: SemaConfig::default() }
    }

    pub fn with_config(mut self, config: SemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Analyse one unit. An `Err` is an internal invariant failure; user
    /// errors are in the result's diagnostics.
    #[instrument(level = "debug", skip_all)]
    pub fn analyze(&self, unit: CompilationUnit) -> Result<SemaResult, InternalError> {
        let CompilationUnit { env, root, .. } = unit;
        let mut cx = Context {
            types: self.types,
            navigators: self.navigators,
            operators: self.operators,
            config: &self.config,
            env: &env,
            diagnostics: Diagnostics::new(),
        };
        let root = Pipeline::standard().run(root, &mut cx)?;
        let diagnostics = cx.diagnostics;
        info!(
            errors = diagnostics.errors().count(),
            warnings = diagnostics.warnings().count(),
            "analysis finished"
        );
        Ok(SemaResult { root, diagnostics })
    }
}

/// Analyse `unit` against the built-in types and the process-wide
/// registries.
pub fn check(unit: CompilationUnit) -> Result<SemaResult, InternalError> {
    Analyzer::new(TypeTable::builtins(), NavigatorRegistry::global(), OperatorRegistry::global()).analyze(unit)
}
