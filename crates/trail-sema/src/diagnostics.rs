//! Ariadne-based rendering of semantic diagnostics.
//!
//! Output is terse: an error code, a one-line message, a label on the
//! offending span and a help line where a plausible fix exists. Colorless
//! rendering keeps snapshot tests deterministic. JSON rendering emits one
//! object per diagnostic for tooling.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde_json::json;

use crate::error::{Diagnostics, SemaError, Severity};

/// How diagnostics are rendered.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text without ANSI escapes.
    pub fn colorless() -> Self {
        DiagnosticOptions { color: false, json: false }
    }

    pub fn json() -> Self {
        DiagnosticOptions { color: false, json: true }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: true, json: false }
    }
}

// ── Labels and help ────────────────────────────────────────────────────

fn label_message(error: &SemaError) -> String {
    match error {
        SemaError::UnresolvedStep { in_view: Some(ty), .. } => format!("no member of {} matches", ty),
        SemaError::UnresolvedStep { in_view: None, .. } => "not found in this scope".to_string(),
        SemaError::UnresolvedName { .. } => "not found in this scope".to_string(),
        SemaError::UnresolvedMethodCall { arity, .. } => {
            format!("no method taking {} argument(s)", arity)
        }
        SemaError::ReturnTypeMismatch { found, .. } => format!("found {}", found),
        SemaError::MissingReturn { expected, .. } => format!("declared to return {}", expected),
        SemaError::UnresolvedOperator { left, right, .. } => format!("{} and {} have no common operator", left, right),
        SemaError::NavigatorConflict { .. } => String::new(),
    }
}

fn help(error: &SemaError) -> Option<String> {
    match error {
        SemaError::UnresolvedStep { in_view: Some(ty), .. } => {
            Some(format!("register a navigator for {} or one of its supertypes", ty))
        }
        SemaError::ReturnTypeMismatch { expected, .. } => {
            Some(format!("end the body with a value convertible to {}", expected))
        }
        SemaError::MissingReturn { expected, .. } => {
            Some(format!("end the body with an expression of type {}", expected))
        }
        _ => None,
    }
}

fn report_kind(error: &SemaError) -> ReportKind<'static> {
    match error.severity() {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Render one diagnostic.
///
/// Diagnostics without a source location, or rendered without source text,
/// fall back to a single `error[E0101]: message` line.
pub fn render_diagnostic(error: &SemaError, source: &str, filename: &str, opts: &DiagnosticOptions) -> String {
    if opts.json {
        return format!("{}\n", render_json(error, filename));
    }
    let span = match error.span() {
        Some(span) if !span.is_synthetic() && !source.is_empty() => span,
        _ => return render_plain(error),
    };

    let config = Config::default().with_color(opts.color);
    let source_len = source.len();
    // ariadne needs at least a one-character span inside the source.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s == e {
            s.saturating_sub(usize::from(s == source_len))..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };
    let start = span.offset as usize;
    let range = clamp(start..start + span.len as usize);

    let mut builder = Report::build(report_kind(error), range.clone())
        .with_code(error.code())
        .with_message(error.to_string())
        .with_config(config)
        .with_label(
            Label::new(range)
                .with_message(label_message(error))
                .with_color(Color::Red),
        );
    if let Some(help) = help(error) {
        builder.set_help(help);
    }

    let mut buf = Vec::new();
    if builder.finish().write(Source::from(source), &mut buf).is_err() {
        return render_plain(error);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn render_plain(error: &SemaError) -> String {
    let kind = match error.severity() {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let mut out = format!("{}[{}]: {}\n", kind, error.code(), error);
    if let Some(span) = error.span().filter(|s| !s.is_synthetic()) {
        out.push_str(&format!("  --> {}\n", span.start));
    }
    if let Some(help) = help(error) {
        out.push_str(&format!("  = help: {}\n", help));
    }
    out
}

/// The JSON form of a diagnostic.
pub fn render_json(error: &SemaError, filename: &str) -> serde_json::Value {
    let spans: Vec<serde_json::Value> = error
        .span()
        .filter(|s| !s.is_synthetic())
        .map(|span| {
            json!({
                "start": span.offset,
                "end": span.offset + span.len,
                "line": span.start.line,
                "column": span.start.column,
                "label": label_message(error),
            })
        })
        .into_iter()
        .collect();
    json!({
        "code": error.code(),
        "severity": error.severity(),
        "message": error.to_string(),
        "file": filename,
        "spans": spans,
        "fix": help(error),
        "details": error,
    })
}

/// Render every diagnostic in order.
pub fn render_all(diagnostics: &Diagnostics, source: &str, filename: &str, opts: &DiagnosticOptions) -> String {
    diagnostics
        .iter()
        .map(|d| render_diagnostic(d, source, filename, opts))
        .collect()
}
