use crate::ast::Ast;
use crate::emit::{Emitter, collapse_blank_lines};
use crate::errors::{LetheError, LetheResult};
use crate::fold::fold_additions;
use crate::parse::parse_program;
use crate::rewrite::optimize_function;
use crate::walk::{Visit, walk};
use std::collections::HashSet;

/// Marker comment emitted by the upstream code generator; only functions it
/// lists are touched.
pub const GENERATED_MARKER: &str = "// EMSCRIPTEN_GENERATED_FUNCTIONS:";

#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizeStats {
    pub functions: usize,
    pub eliminated: usize,
}

struct GeneratedSet {
    /// original order, for re-emission
    names: Vec<String>,
    set: HashSet<String>,
}

fn generated_functions(src: &str) -> LetheResult<Option<GeneratedSet>> {
    for line in src.lines() {
        if let Some(rest) = line.strip_prefix(GENERATED_MARKER) {
            let names: Vec<String> = serde_json::from_str(rest.trim())?;
            let set = names.iter().cloned().collect();
            return Ok(Some(GeneratedSet { names, set }));
        }
    }
    Ok(None)
}

/// Whole-file pipeline: locate the marker, parse, optimize every tagged
/// function, print each top-level statement, collapse blank runs, re-emit the
/// marker once.
pub fn process_source(src: &str) -> LetheResult<(String, OptimizeStats)> {
    let generated = generated_functions(src)?;
    let mut program = parse_program(src)?;
    let mut stats = OptimizeStats::default();

    if let Some(generated) = &generated {
        walk(&mut program, &mut |node, _| {
            match node {
                Ast::Defun { name, body, .. } if generated.set.contains(name.as_str()) => {
                    stats.functions += 1;
                    stats.eliminated += optimize_function(body);
                    for stmt in body.iter_mut() {
                        fold_additions(stmt);
                    }
                }
                Ast::Function {
                    name: Some(name),
                    body,
                    ..
                } if generated.set.contains(name.as_str()) => {
                    stats.functions += 1;
                    stats.eliminated += optimize_function(body);
                    for stmt in body.iter_mut() {
                        fold_additions(stmt);
                    }
                }
                _ => {}
            }
            Visit::Continue
        });
        tracing::debug!(
            target: "process",
            functions = stats.functions,
            eliminated = stats.eliminated,
            "optimized generated functions"
        );
    } else {
        tracing::debug!(target: "process", "no generated-functions marker; passing through");
    }

    let Ast::Toplevel(stmts) = &program else {
        return Err(LetheError::Msg("parser did not produce a toplevel".to_owned()));
    };
    // print each top-level child on its own, not the whole program at once
    let mut text = String::new();
    for stmt in stmts {
        let mut em = Emitter::new();
        em.stmt(stmt);
        text.push_str(&em.finish());
    }
    let mut out = collapse_blank_lines(&text);
    if let Some(generated) = &generated {
        out.push_str(GENERATED_MARKER);
        out.push(' ');
        out.push_str(&serde_json::to_string(&generated.names)?);
        out.push('\n');
    }
    Ok((out, stats))
}

#[test]
fn only_marked_functions_are_optimized() {
    let src = "\
// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]
function f(x) { var a = x + 1; return a; }
function g(x) { var a = x + 1; return a; }
";
    let (out, stats) = process_source(src).unwrap();
    assert_eq!(
        out,
        "function f(x) {\n  return x + 1;\n}\nfunction g(x) {\n  var a = x + 1;\n  return a;\n}\n// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]\n"
    );
    assert_eq!(stats.functions, 1);
    assert_eq!(stats.eliminated, 1);
}

#[test]
fn folding_runs_after_elimination() {
    let src = "\
// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]
function f() { var q = 2; var a = 1 + q; g(a); }
";
    let (out, _) = process_source(src).unwrap();
    assert_eq!(
        out,
        "function f() {\n  g(3);\n}\n// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]\n"
    );
}

#[test]
fn folding_also_reaches_kept_declarations() {
    // `a` reads the non-local `x`, so the call keeps it; its initializer
    // chain still folds
    let src = "\
// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]
function f(x) { var a = 1 + 2 + x; g(a); }
";
    let (out, _) = process_source(src).unwrap();
    assert_eq!(
        out,
        "function f(x) {\n  var a = 3 + x;\n  g(a);\n}\n// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]\n"
    );
}

#[test]
fn missing_marker_means_passthrough() {
    let (out, stats) = process_source("function f(x) { var a = x; return a; }").unwrap();
    assert_eq!(out, "function f(x) {\n  var a = x;\n  return a;\n}\n");
    assert_eq!(stats.functions, 0);
}

#[test]
fn marker_order_is_preserved() {
    let src = "\
// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"b\", \"a\"]
function a() { return 1; }
function b() { return 2; }
";
    let (out, stats) = process_source(src).unwrap();
    assert!(out.ends_with("// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"b\",\"a\"]\n"));
    assert_eq!(stats.functions, 2);
}

#[test]
fn malformed_marker_is_fatal() {
    let err = process_source("// EMSCRIPTEN_GENERATED_FUNCTIONS: not-json\n").unwrap_err();
    assert!(matches!(err, LetheError::Marker(_)));
}

#[test]
fn named_function_expressions_are_also_optimized() {
    let src = "\
// EMSCRIPTEN_GENERATED_FUNCTIONS: [\"f\"]
var h = function f(x) { var a = x + 1; return a; };
";
    let (out, stats) = process_source(src).unwrap();
    assert_eq!(stats.functions, 1);
    assert!(out.contains("return x + 1;"));
}
