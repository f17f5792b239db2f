//! The pass framework.
//!
//! Each pass is a full tree rewrite `Node -> Node`. Passes run in a fixed
//! order and share one [`Context`]: the registries, the type table, the
//! configuration, the compilation unit's environment and the diagnostics
//! sink.

use tracing::{debug, info_span, instrument};
use trail_common::InternalError;
use trail_syntax::Node;

use crate::binary::OperatorResolver;
use crate::config::SemaConfig;
use crate::error::Diagnostics;
use crate::navigation::NavigationResolver;
use crate::navigators::NavigatorRegistry;
use crate::operators::OperatorRegistry;
use crate::report::UnresolvedReporter;
use crate::returns::ReturnChecker;
use crate::types::TypeInfo;
use crate::widening::NumericWidening;
use crate::UnitEnv;

/// Shared state for one compilation.
pub struct Context<'a> {
    pub types: &'a dyn TypeInfo,
    pub navigators: &'a NavigatorRegistry,
    pub operators: &'a OperatorRegistry,
    pub config: &'a SemaConfig,
    pub env: &'a UnitEnv,
    pub diagnostics: Diagnostics,
}

/// A semantic-analysis pass.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Rewrite the whole tree. User errors go to `cx.diagnostics`; an `Err`
    /// means the tree violated an internal invariant.
    fn run(&mut self, root: Node, cx: &mut Context<'_>) -> Result<Node, InternalError>;
}

/// An ordered list of passes applied one after another.
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    pub fn new(passes: Vec<Box<dyn Pass>>) -> Self {
        Pipeline { passes }
    }

    /// Navigation, operators, widening, return checking, then the late
    /// unresolved-name reporter.
    pub fn standard() -> Self {
        Pipeline::new(vec![
            Box::new(NavigationResolver::new()),
            Box::new(OperatorResolver),
            Box::new(NumericWidening),
            Box::new(ReturnChecker),
            Box::new(UnresolvedReporter),
        ])
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    #[instrument(level = "debug", skip_all, fields(passes = self.passes.len()))]
    pub fn run(&mut self, mut root: Node, cx: &mut Context<'_>) -> Result<Node, InternalError> {
        for pass in &mut self.passes {
            let span = info_span!("pass", name = pass.name());
            let _entered = span.enter();
            let before = cx.diagnostics.len();
            root = pass.run(root, cx)?;
            debug!(new_diagnostics = cx.diagnostics.len() - before, "pass finished");
        }
        Ok(root)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
