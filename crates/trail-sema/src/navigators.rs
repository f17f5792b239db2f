//! The navigator registry.
//!
//! A navigator turns one navigation step on a receiver of a known type into
//! a concrete resolved expression (a property read, a method call, the
//! receiver itself, ...). Navigators are registered by providers against a
//! declaring type, a set of axes and a set of node tests, and are found
//! again by walking the receiver's supertypes.
//!
//! ## Semantics
//!
//! - Registration is first-wins: a second navigator for an occupied
//!   (type, axis, test) slot is dropped.
//! - Lookup returns every candidate along the supertype walk; for each type,
//!   exact-test matches come before wildcard matches.
//! - The registry is safe to share: lookups take a read lock, registrations
//!   a write lock.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;
use trail_syntax::{Axis, NavStep, Node, NodeTest, Reduction, Ty};

use crate::config::ConflictPolicy;
use crate::error::SemaError;
use crate::providers::StandardNavigators;
use crate::types::{type_key, TypeInfo};

// ---------------------------------------------------------------------------
// Navigators
// ---------------------------------------------------------------------------

/// What a navigator is asked to resolve.
pub struct NavRequest<'a> {
    pub step: &'a NavStep,
    /// The expression producing the value the step applies to: `this`, a
    /// local, or the stacked result of the previous chain link.
    pub receiver: &'a Node,
    pub receiver_ty: &'a Ty,
    pub types: &'a dyn TypeInfo,
}

impl NavRequest<'_> {
    /// Arguments of a call test; empty for every other test.
    pub fn args(&self) -> &[Node] {
        match &self.step.test {
            NodeTest::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// The member name the step tests for, if it names one.
    pub fn member(&self) -> Option<&str> {
        match &self.step.test {
            NodeTest::Name(name) | NodeTest::Call { name, .. } => Some(name),
            _ => None,
        }
    }
}

type NavigatorFn = dyn Fn(&NavRequest<'_>) -> Option<Node> + Send + Sync;

/// A resolution function plus a label used in logs and conflict reports.
#[derive(Clone)]
pub struct Navigator {
    label: Arc<str>,
    func: Arc<NavigatorFn>,
}

impl Navigator {
    pub fn new<F>(label: &str, func: F) -> Self
    where
        F: Fn(&NavRequest<'_>) -> Option<Node> + Send + Sync + 'static,
    {
        Navigator { label: Arc::from(label), func: Arc::new(func) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolve a step, or `None` when this navigator does not apply.
    pub fn apply(&self, request: &NavRequest<'_>) -> Option<Node> {
        (self.func)(request)
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Navigator").field(&self.label).finish()
    }
}

/// The node-test slot a navigator is registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TestKey {
    Name(String),
    /// Any name test (`*`); also the fallback for every name test.
    AnyName,
    SelfTest,
    Call(String),
    /// Fallback for every call test.
    AnyCall,
    Reduction(Reduction),
}

impl TestKey {
    /// Parse the manifest notation: `*`, `node()`, `name()`, `name(*)` or a
    /// plain member name.
    pub fn parse(text: &str) -> TestKey {
        match text {
            "*" => TestKey::AnyName,
            "node()" => TestKey::SelfTest,
            "*()" => TestKey::AnyCall,
            _ => match text.strip_suffix("()") {
                Some(name) => TestKey::Call(name.to_string()),
                None => TestKey::Name(text.to_string()),
            },
        }
    }

    /// The exact slot a step's test looks up.
    pub fn of(test: &NodeTest) -> TestKey {
        match test {
            NodeTest::Name(name) => TestKey::Name(name.clone()),
            NodeTest::Wildcard => TestKey::AnyName,
            NodeTest::SelfTest => TestKey::SelfTest,
            NodeTest::Call { name, .. } => TestKey::Call(name.clone()),
            NodeTest::Reduction(r) => TestKey::Reduction(*r),
        }
    }

    /// The wildcard slot consulted after the exact one, if any.
    fn fallback(&self) -> Option<TestKey> {
        match self {
            TestKey::Name(_) => Some(TestKey::AnyName),
            TestKey::Call(_) => Some(TestKey::AnyCall),
            _ => None,
        }
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKey::Name(name) => f.write_str(name),
            TestKey::AnyName => f.write_str("*"),
            TestKey::SelfTest => f.write_str("node()"),
            TestKey::Call(name) => write!(f, "{}()", name),
            TestKey::AnyCall => f.write_str("*()"),
            TestKey::Reduction(r) => f.write_str(r.notation()),
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// One navigator registration.
#[derive(Clone, Debug)]
pub struct Registration {
    pub declaring: Ty,
    pub axes: Vec<Axis>,
    pub tests: Vec<TestKey>,
    pub navigator: Navigator,
}

/// A source of navigator registrations, loaded once into a registry.
pub trait NavigatorProvider: Send + Sync {
    fn name(&self) -> &str;
    fn registrations(&self) -> Vec<Registration>;
}

// ---------------------------------------------------------------------------
// NavigatorRegistry
// ---------------------------------------------------------------------------

type TestTable = FxHashMap<TestKey, Navigator>;
type AxisTable = FxHashMap<Axis, TestTable>;

/// Navigators indexed by declaring type, then axis, then node test.
pub struct NavigatorRegistry {
    types: RwLock<FxHashMap<String, AxisTable>>,
    policy: ConflictPolicy,
}

impl NavigatorRegistry {
    /// An empty registry.
    pub fn new(policy: ConflictPolicy) -> Self {
        NavigatorRegistry { types: RwLock::new(FxHashMap::default()), policy }
    }

    /// A registry preloaded with the standard navigators.
    pub fn standard(policy: ConflictPolicy) -> Self {
        let registry = NavigatorRegistry::new(policy);
        registry.load(&StandardNavigators);
        registry
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Register `navigator` for every combination of `axes` and `tests` on
    /// `declaring`.
    ///
    /// Occupied slots keep their navigator. Under
    /// [`ConflictPolicy::Report`] each dropped slot is returned as a
    /// warning; under [`ConflictPolicy::FirstWins`] the result is empty.
    pub fn add_navigator(
        &self,
        declaring: &Ty,
        axes: &[Axis],
        tests: &[TestKey],
        navigator: Navigator,
    ) -> Vec<SemaError> {
        let mut conflicts = Vec::new();
        let mut types = self.types.write();
        let by_axis = types.entry(type_key(declaring)).or_default();
        for axis in axes {
            let by_test = by_axis.entry(axis.clone()).or_default();
            for test in tests {
                match by_test.get(test) {
                    Some(existing) => {
                        debug!(
                            declaring = %declaring,
                            axis = %axis,
                            test = %test,
                            kept = existing.label(),
                            dropped = navigator.label(),
                            "navigator slot already taken"
                        );
                        if self.policy == ConflictPolicy::Report {
                            conflicts.push(SemaError::NavigatorConflict {
                                declaring: declaring.clone(),
                                axis: axis.clone(),
                                test: test.to_string(),
                                kept: existing.label().to_string(),
                                dropped: navigator.label().to_string(),
                            });
                        }
                    }
                    None => {
                        by_test.insert(test.clone(), navigator.clone());
                    }
                }
            }
        }
        conflicts
    }

    pub fn register(&self, registration: Registration) -> Vec<SemaError> {
        self.add_navigator(
            &registration.declaring,
            &registration.axes,
            &registration.tests,
            registration.navigator,
        )
    }

    /// Register everything a provider offers.
    pub fn load(&self, provider: &dyn NavigatorProvider) -> Vec<SemaError> {
        let registrations = provider.registrations();
        debug!(provider = provider.name(), count = registrations.len(), "loading navigators");
        registrations.into_iter().flat_map(|r| self.register(r)).collect()
    }

    /// Candidate navigators for `step` on a receiver of type `from`.
    ///
    /// Types are visited in supertype-walk order; at each type the exact
    /// test comes first, then its wildcard fallback.
    pub fn lookup(&self, from: &Ty, step: &NavStep, types: &dyn TypeInfo) -> Vec<Navigator> {
        let exact = TestKey::of(&step.test);
        let fallback = exact.fallback();
        let registered = self.types.read();
        let mut found = Vec::new();
        for ty in types.supertype_walk(from) {
            let Some(by_test) = registered
                .get(&type_key(&ty))
                .and_then(|by_axis| by_axis.get(&step.axis))
            else {
                continue;
            };
            found.extend(by_test.get(&exact).cloned());
            if let Some(wild) = &fallback {
                found.extend(by_test.get(wild).cloned());
            }
        }
        found
    }

    /// Total number of occupied (type, axis, test) slots.
    pub fn size(&self) -> usize {
        self.types
            .read()
            .values()
            .flat_map(|by_axis| by_axis.values())
            .map(|by_test| by_test.len())
            .sum()
    }

    pub fn clear(&self) {
        self.types.write().clear();
    }

    /// The process-wide registry holding the standard navigators.
    pub fn global() -> &'static NavigatorRegistry {
        static GLOBAL: OnceLock<NavigatorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| NavigatorRegistry::standard(ConflictPolicy::FirstWins))
    }
}

impl Default for NavigatorRegistry {
    fn default() -> Self {
        Self::new(ConflictPolicy::FirstWins)
    }
}
