//! Rendering of diagnostics produced by real analyses.
//!
//! Each test triggers a specific error through the analyzer with source
//! spans attached, then renders it the way `trailc` does: through ariadne
//! against the source text, as a plain line when there is no source, or as
//! JSON for tooling.

mod common;

use common::*;
use trail_common::Span;
use trail_sema::diagnostics::{render_all, render_diagnostic, DiagnosticOptions};
use trail_sema::SemaResult;
use trail_syntax::{BinOp, MethodDecl, NavStep, Node, NodeKind, Param, Ty};

// ── Helpers ────────────────────────────────────────────────────────────

/// Colorless options for deterministic output.
fn opts() -> DiagnosticOptions {
    DiagnosticOptions::colorless()
}

/// A child step spanning `lexeme` at `offset` on line 1.
fn step_at(name: &str, offset: u32) -> NavStep {
    NavStep::child(name).at(Span::new(1, offset + 1, offset, name))
}

/// `address\missing`, with spans.
const MISSING_SRC: &str = "address\\missing";

fn missing_member() -> SemaResult {
    analyze(Node::stream(vec![step_at("address", 0), step_at("missing", 8)]))
}

fn render_first(result: &SemaResult, src: &str, opts: &DiagnosticOptions) -> String {
    let first = result.diagnostics.iter().next().expect("expected a diagnostic");
    render_diagnostic(first, src, "query.trail", opts)
}

// ── Source rendering ───────────────────────────────────────────────────

#[test]
fn unresolved_step_points_at_the_step() {
    let out = render_first(&missing_member(), MISSING_SRC, &opts());
    assert!(out.contains("[E0101]"), "{out}");
    assert!(out.contains("cannot resolve `child::missing` on Address"), "{out}");
    assert!(out.contains("no member of Address matches"), "{out}");
    assert!(out.contains("register a navigator for Address or one of its supertypes"), "{out}");
    assert!(out.contains(MISSING_SRC), "{out}");
    assert!(!out.contains('\u{1b}'), "{out}");
}

#[test]
fn colored_rendering_has_escapes() {
    let out = render_first(&missing_member(), MISSING_SRC, &DiagnosticOptions::default());
    assert!(out.contains('\u{1b}'), "{out}");
}

#[test]
fn every_error_is_rendered_in_order() {
    let src = "nickname + shout()";
    let tree = Node::binary(
        BinOp::Add,
        Node::name("nickname").at(Span::new(1, 1, 0, "nickname")),
        Node::call("shout", vec![]).at(Span::new(1, 12, 11, "shout()")),
    );
    let result = analyze(tree);
    let rendered = result.render_errors(src, "query.trail", &opts());
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].contains("unresolved name `nickname`"), "{}", rendered[0]);
    assert!(rendered[1].contains("unresolved method `shout` taking 0 argument(s)"), "{}", rendered[1]);
    assert!(rendered[1].contains("no method taking 0 argument(s)"), "{}", rendered[1]);
    assert_eq!(render_all(&result.diagnostics, src, "query.trail", &opts()), rendered.concat());
}

// ── Plain rendering ────────────────────────────────────────────────────

#[test]
fn without_source_a_single_line_is_printed() {
    let out = render_first(&missing_member(), "", &opts());
    insta::assert_snapshot!(out, @r"
    error[E0101]: cannot resolve `child::missing` on Address
      --> 1:9
      = help: register a navigator for Address or one of its supertypes
    ");
}

#[test]
fn return_mismatch_in_a_synthetic_tree() {
    let tree = Node::new(NodeKind::MethodDecl(MethodDecl {
        name: "half".into(),
        params: vec![Param { name: "n".into(), ty: Ty::int() }],
        return_ty: Some(Ty::int()),
        body: vec![Node::binary(BinOp::Div, Node::name("n"), Node::literal(trail_syntax::Literal::Double(2.0)))],
    }));
    let result = analyze(tree);
    assert_eq!(codes(&result), vec!["E0104"]);
    let out = render_first(&result, "", &opts());
    insta::assert_snapshot!(out, @r"
    error[E0104]: `half` returns int, but its body produces double
      = help: end the body with a value convertible to int
    ");
}

#[test]
fn missing_return_is_reported_on_the_method() {
    let tree = Node::new(NodeKind::MethodDecl(MethodDecl {
        name: "label".into(),
        params: Vec::new(),
        return_ty: Some(Ty::int()),
        body: Vec::new(),
    }))
    .at(Span::new(3, 5, 40, "label"));
    let result = analyze(tree);
    let out = render_first(&result, "", &opts());
    insta::assert_snapshot!(out, @r"
    error[E0105]: `label` must return int, but its body is empty
      --> 3:5
      = help: end the body with an expression of type int
    ");
}

#[test]
fn reference_method_without_body_returns_null() {
    let tree = Node::new(NodeKind::MethodDecl(MethodDecl {
        name: "label".into(),
        params: Vec::new(),
        return_ty: Some(Ty::string()),
        body: Vec::new(),
    }));
    let result = analyze(tree);
    assert!(result.can_emit(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(result.root, @"(method label () -> String null)");
}

// ── JSON ───────────────────────────────────────────────────────────────

#[test]
fn json_output_is_one_object_per_line() {
    let out = render_first(&missing_member(), MISSING_SRC, &DiagnosticOptions::json());
    assert!(out.ends_with('\n'));
    assert_eq!(out.lines().count(), 1);

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["code"], "E0101");
    assert_eq!(value["severity"], "error");
    assert_eq!(value["file"], "query.trail");
    assert_eq!(value["message"], "cannot resolve `child::missing` on Address");
    assert_eq!(value["spans"][0]["start"], 8);
    assert_eq!(value["spans"][0]["end"], 15);
    assert_eq!(value["spans"][0]["line"], 1);
    assert_eq!(value["spans"][0]["column"], 9);
    assert_eq!(value["details"]["step"], "child::missing");
    assert_eq!(value["details"]["in_view"]["Con"]["name"], "Address");
}
