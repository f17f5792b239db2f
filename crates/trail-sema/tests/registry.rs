//! Navigator registry behaviour seen through the analyzer: supertype and
//! wildcard matching, conflict handling, manifests and concurrent use.

mod common;

use std::thread;

use common::*;
use insta::assert_snapshot;
use trail_sema::config::ConflictPolicy;
use trail_sema::error::{SemaError, Severity};
use trail_sema::navigators::{Navigator, NavigatorRegistry, TestKey};
use trail_sema::operators::OperatorRegistry;
use trail_sema::providers::{Manifest, StandardNavigators, StaticProvider};
use trail_sema::types::{TypeInfo, TypeTable};
use trail_sema::{Analyzer, CompilationUnit, SemaResult, UnitEnv};
use trail_syntax::{Axis, Literal, NavStep, Node, NodeKind, NodeTest, Reduction, Ty};

// ── Helpers ────────────────────────────────────────────────────────────

fn analyze_on(types: &dyn TypeInfo, navigators: &NavigatorRegistry, env: UnitEnv, root: Node) -> SemaResult {
    Analyzer::new(types, navigators, OperatorRegistry::global())
        .analyze(CompilationUnit::new(root).with_env(env))
        .expect("analysis hit an internal error")
}

/// Reads `name` from whatever receiver it is applied to.
fn read_name() -> Navigator {
    Navigator::new("title", |req| {
        Some(
            Node::new(NodeKind::PropertyRead { target: Box::new(req.receiver.clone()), name: "name".into() })
                .typed(Ty::string()),
        )
    })
}

fn constant(label: &str, value: i32) -> Navigator {
    Navigator::new(label, move |_| Some(Node::literal(Literal::Int(value))))
}

fn labels(found: &[Navigator]) -> Vec<&str> {
    found.iter().map(Navigator::label).collect()
}

// ── Matching ───────────────────────────────────────────────────────────

#[test]
fn navigator_on_an_interface_serves_implementors() {
    let w = world();
    let types = model();
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    let provider = StaticProvider::new("titles").with(Ty::con("Named"), &[Axis::Child], &["title"], read_name());
    assert!(navigators.load(&provider).is_empty());

    let result = analyze_on(&types, &navigators, person_env(), steps(vec![
        NavStep::child("friends"),
        NavStep::child("title"),
        reduce(Reduction::List),
    ]));
    assert!(result.can_emit());
    let (value, _) = execute(&w.heap, &w.ada, &result.root);
    assert_eq!(value, Value::List(vec![Value::str("Bob"), Value::str("Cy")]));

    // Address does not implement Named.
    let result = analyze_on(&types, &navigators, person_env(), path(&["address", "title"]));
    assert_eq!(codes(&result), vec!["E0101"]);
}

#[test]
fn wildcard_catches_names_nothing_else_claims() {
    let types = model();
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    let field = Navigator::new("address-field", |req| {
        let name = req.member()?;
        Some(
            Node::new(NodeKind::MethodCall {
                target: Box::new(req.receiver.clone()),
                owner: Ty::con("Address"),
                name: "field".into(),
                args: vec![Node::literal(Literal::String(name.to_string()))],
            })
            .typed(Ty::string()),
        )
    });
    navigators.load(&StaticProvider::new("fields").with(Ty::con("Address"), &[Axis::Child], &["*"], field));

    let result = analyze_on(&types, &navigators, person_env(), path(&["address", "postcode"]));
    assert!(result.can_emit());
    assert_snapshot!(
        result.root,
        @r#"(do (. this address) dup (if (null? _) (do pop null) (invoke _ Address.field "postcode")))"#
    );

    // Declared properties are still read directly: Object's reflective
    // navigator comes first in the walk.
    let result = analyze_on(&types, &navigators, person_env(), path(&["address", "city"]));
    assert_snapshot!(result.root, @"(do (. this address) dup (if (null? _) (do pop null) (. _ city)))");
}

#[test]
fn lookup_concatenates_matches_in_walk_order() {
    let types = model();
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    navigators.add_navigator(&Ty::con("Person"), &[Axis::Child], &[TestKey::parse("name")], constant("person-name", 1));
    navigators.add_navigator(&Ty::con("Named"), &[Axis::Child], &[TestKey::parse("name")], constant("named-name", 2));
    navigators.add_navigator(&Ty::con("Person"), &[Axis::Child], &[TestKey::AnyName], constant("person-any", 3));

    let person = Ty::con("Person");
    let found = navigators.lookup(&person, &NavStep::child("name"), &types);
    assert_eq!(labels(&found), vec!["reflect-property", "named-name", "person-name", "person-any"]);

    let found = navigators.lookup(&person, &NavStep::child("zzz"), &types);
    assert_eq!(labels(&found), vec!["reflect-property", "person-any"]);

    // Wildcard fallback is for name tests only.
    let found = navigators.lookup(&person, &NavStep::self_node(), &types);
    assert_eq!(labels(&found), vec!["identity"]);
    let found = navigators.lookup(&person, &NavStep::call("greeting", vec![]), &types);
    assert_eq!(labels(&found), vec!["reflect-method"]);

    let attribute = NavStep::new(Axis::Attribute, NodeTest::Name("age".into()));
    assert_eq!(labels(&navigators.lookup(&person, &attribute, &types)), vec!["reflect-property"]);
    let parent = NavStep::new(Axis::Parent, NodeTest::Name("age".into()));
    assert!(navigators.lookup(&person, &parent, &types).is_empty());
}

// ── Conflicts ──────────────────────────────────────────────────────────

#[test]
fn first_registration_wins_silently_by_default() {
    let types = model();
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    let first = StaticProvider::new("first").with(Ty::con("Person"), &[Axis::Child], &["nick"], constant("a", 1));
    let second = StaticProvider::new("second").with(Ty::con("Person"), &[Axis::Child], &["nick"], constant("b", 2));
    assert!(navigators.load(&first).is_empty());
    assert!(navigators.load(&second).is_empty());

    let result = analyze_on(&types, &navigators, person_env(), path(&["nick"]));
    assert_snapshot!(result.root, @"1");
}

#[test]
fn report_policy_turns_conflicts_into_warnings() {
    let navigators = NavigatorRegistry::standard(ConflictPolicy::Report);
    let first = StaticProvider::new("first")
        .with(Ty::con("Person"), &[Axis::Child, Axis::Attribute], &["nick"], constant("a", 1));
    let second = StaticProvider::new("second")
        .with(Ty::con("Person"), &[Axis::Child, Axis::Attribute], &["nick"], constant("b", 2));
    assert!(navigators.load(&first).is_empty());

    let conflicts = navigators.load(&second);
    assert_eq!(conflicts.len(), 2);
    assert!(conflicts.iter().all(|c| c.code() == "W0101" && c.severity() == Severity::Warning));
    let mut messages: Vec<_> = conflicts.iter().map(ToString::to_string).collect();
    messages.sort();
    assert_eq!(
        messages[1],
        "navigator `b` for child::nick on Person ignored; `a` was registered first"
    );

    // Warnings never block emission.
    let types = model();
    let mut result = analyze_on(&types, &navigators, person_env(), path(&["nick"]));
    result.diagnostics.extend(conflicts);
    assert!(result.can_emit());
    assert_eq!(result.diagnostics.warnings().count(), 2);
}

#[test]
fn reloading_the_standard_navigators_is_idempotent() {
    let navigators = NavigatorRegistry::standard(ConflictPolicy::Report);
    let before = navigators.size();
    let conflicts = navigators.load(&StandardNavigators);
    assert_eq!(navigators.size(), before);
    assert_eq!(conflicts.len(), before);
    assert!(matches!(&conflicts[0], SemaError::NavigatorConflict { declaring, .. } if *declaring == Ty::object()));
}

// ── Concurrency ────────────────────────────────────────────────────────

#[test]
fn lookups_race_with_late_registrations() {
    let types = model();
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    let before = navigators.size();
    let person = Ty::con("Person");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..500 {
                    let found = navigators.lookup(&person, &NavStep::child("name"), &types);
                    assert_eq!(found.first().map(Navigator::label), Some("reflect-property"));
                }
            });
        }
        s.spawn(|| {
            for i in 0..50 {
                let test = format!("extra{}", i);
                let provider = StaticProvider::new("late")
                    .with(person.clone(), &[Axis::Child], &[test.as_str()], constant("extra", i));
                assert!(navigators.load(&provider).is_empty());
            }
        });
    });

    assert_eq!(navigators.size(), before + 50);
    let found = navigators.lookup(&person, &NavStep::child("extra7"), &types);
    assert_eq!(labels(&found), vec!["reflect-property", "extra"]);
}

#[test]
fn process_wide_registries_are_shared() {
    let a = NavigatorRegistry::global() as *const NavigatorRegistry;
    let b = NavigatorRegistry::global() as *const NavigatorRegistry;
    assert_eq!(a, b);
    assert!(!OperatorRegistry::global().is_empty());
}

// ── Manifests ──────────────────────────────────────────────────────────

const BILLING: &str = r#"
[[class]]
name = "Invoice"
properties = { number = "String" }
methods = [{ name = "total", returns = "double" }]

[[class]]
name = "Customer"
properties = { invoices = "List<Invoice>" }

[[navigator]]
type = "Invoice"
tests = ["sum"]
method = "total"
"#;

#[test]
fn manifest_classes_and_aliases_take_part_in_analysis() {
    let manifest = Manifest::from_toml_str("billing", BILLING).unwrap();
    let mut types = TypeTable::with_builtins();
    manifest.install_types(&mut types);
    let navigators = NavigatorRegistry::standard(ConflictPolicy::FirstWins);
    assert!(navigators.load(&manifest).is_empty());

    let env = UnitEnv { binding: Ty::con("Customer"), ..UnitEnv::default() };
    let result = analyze_on(&types, &navigators, env, steps(vec![
        NavStep::child("invoices"),
        NavStep::child("sum"),
        reduce(Reduction::Array),
    ]));
    assert!(result.can_emit(), "{:?}", result.diagnostics);
    assert_snapshot!(
        result.root,
        @"(do (. this invoices) dup (if (null? _) (do pop null) (collect [[]] (map (seq _) |$e0| (do $e0 dup (if (null? _) (do pop null) (box Double (invoke _ Invoice.total))))))))"
    );
    assert_eq!(result.root.ty, Some(Ty::array(Ty::con("Double"))));
}

#[test]
fn manifest_errors_are_reported() {
    let err = Manifest::from_toml_str("bad", "[[navigator]]\ntype = \"Nope\"\ntests = [\"x\"]\nproperty = \"y\"\n")
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "unknown class `Nope` referenced by manifest `bad`");
}
