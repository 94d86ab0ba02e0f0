use crate::ast::{Ast, Kind};
use crate::deps::analyze_initializers;
use crate::live::analyze_live_ranges;
use crate::vars::{VarInfo, scan_vars};
use crate::walk::{Visit, walk};
use std::collections::HashMap;

/// Above one use per binding, eliminated bindings referencing each other can
/// blow up super-linearly during collapse.
const MAX_USES: usize = 1;

fn eliminable(info: &VarInfo) -> bool {
    info.is_single_def
        && info.uses_only_simple_nodes
        && (info.use_count == 0
            || (info.use_count <= MAX_USES && !info.deps_mutated_in_live_range))
}

/// Run the whole elimination pipeline over one function body, in place.
/// Returns the number of bindings erased.
pub fn optimize_function(body: &mut [Ast]) -> usize {
    let mut table = scan_vars(body);
    let affects = analyze_initializers(&mut table);
    let closure = affects.saturate(&mut table);
    analyze_live_ranges(body, &closure, &mut table);

    let mut doomed: HashMap<String, Ast> = HashMap::new();
    for (name, info) in &table {
        if eliminable(info) {
            if let Some(init) = &info.initial_value {
                doomed.insert(name.clone(), init.clone());
            }
        }
    }
    if doomed.is_empty() {
        return 0;
    }
    tracing::debug!(target: "rewrite", count = doomed.len(), "inlining single-use temporaries");

    remove_declarations(body, &doomed);
    let values = collapse_values(doomed);
    substitute_uses(body, &values);
    values.len()
}

/// Strip eliminated names out of every `var`; a declaration left empty becomes
/// the no-op placeholder statement.
fn remove_declarations(body: &mut [Ast], doomed: &HashMap<String, Ast>) {
    for stmt in body.iter_mut() {
        walk(stmt, &mut |node, kind| {
            if kind == Kind::Var {
                if let Ast::Var(decls) = node {
                    decls.retain(|d| !doomed.contains_key(&d.name));
                    if decls.is_empty() {
                        return Visit::Replace(Ast::empty());
                    }
                }
            }
            Visit::Continue
        });
    }
}

/// Rewrite eliminated initializers against each other until none references
/// another eliminated name. Terminates because single-def bindings cannot form
/// reference cycles; a self-reference would need two definitions of one name
/// and is asserted against.
fn collapse_values(mut values: HashMap<String, Ast>) -> HashMap<String, Ast> {
    loop {
        let mut changed = false;
        let names: Vec<String> = values.keys().cloned().collect();
        for name in names {
            let Some(mut value) = values.remove(&name) else {
                continue;
            };
            walk(&mut value, &mut |node, kind| {
                if kind == Kind::Name {
                    if let Ast::Name(n) = node {
                        assert_ne!(
                            n, &name,
                            "self-referential initializer for eliminated binding `{name}`"
                        );
                        if let Some(replacement) = values.get(n) {
                            changed = true;
                            return Visit::Replace(replacement.clone());
                        }
                    }
                }
                Visit::Continue
            });
            values.insert(name, value);
        }
        if !changed {
            break;
        }
    }
    values
}

/// Substitution clones the initializer at every use: the purity invariant
/// would let subtrees be shared, but the printer may be handed the tree again.
fn substitute_uses(body: &mut [Ast], values: &HashMap<String, Ast>) {
    for stmt in body.iter_mut() {
        walk(stmt, &mut |node, kind| {
            if kind == Kind::Name {
                if let Ast::Name(n) = node {
                    if let Some(value) = values.get(n) {
                        return Visit::Replace(value.clone());
                    }
                }
            }
            Visit::Continue
        });
    }
}

#[cfg(test)]
fn optimized(src: &str) -> String {
    let ast = crate::parse::parse_program(src).unwrap();
    let Ast::Toplevel(stmts) = ast else {
        panic!("expected toplevel");
    };
    let Some(Ast::Defun { name, args, mut body }) = stmts.into_iter().next() else {
        panic!("expected defun");
    };
    optimize_function(&mut body);
    crate::emit::collapse_blank_lines(&crate::emit::stmt_to_string(&Ast::Defun {
        name,
        args,
        body,
    }))
}

#[test]
fn inlines_a_single_use_temporary() {
    assert_eq!(
        optimized("function f(x) { var a = x + 1; return a; }"),
        "function f(x) {\n  return x + 1;\n}\n"
    );
}

#[test]
fn keeps_a_binding_whose_dependency_is_written() {
    assert_eq!(
        optimized("function f(x) { var a = x + 1; x = 2; return a; }"),
        "function f(x) {\n  var a = x + 1;\n  x = 2;\n  return a;\n}\n"
    );
}

#[test]
fn keeps_an_impure_initializer() {
    assert_eq!(
        optimized("function f() { var a = g(); return a; }"),
        "function f() {\n  var a = g();\n  return a;\n}\n"
    );
}

#[test]
fn keeps_a_reassigned_binding() {
    assert_eq!(
        optimized("function f() { var a = 1; a = 2; return a; }"),
        "function f() {\n  var a = 1;\n  a = 2;\n  return a;\n}\n"
    );
}

#[test]
fn drops_an_unused_declaration() {
    assert_eq!(
        optimized("function f() { var a = 1; return 0; }"),
        "function f() {\n  return 0;\n}\n"
    );
}

#[test]
fn keeps_a_global_read_across_a_call() {
    assert_eq!(
        optimized("function f(x) { var a = x; g(); return a; }"),
        "function f(x) {\n  var a = x;\n  g();\n  return a;\n}\n"
    );
}

#[test]
fn collapses_chained_temporaries() {
    assert_eq!(
        optimized("function f(x) { var a = x + 1; var b = a; return b; }"),
        "function f(x) {\n  return x + 1;\n}\n"
    );
}

#[test]
fn inlines_the_synthesized_undefined() {
    assert_eq!(
        optimized("function f() { var a; return a; }"),
        "function f() {\n  return undefined;\n}\n"
    );
}

#[test]
fn keeps_surviving_declarations_in_a_shared_var() {
    assert_eq!(
        optimized("function f() { var q = 1; var a = q + 1, b = 1; b = 2; return a + b; }"),
        "function f() {\n  var b = 1;\n  b = 2;\n  return 1 + 1 + b;\n}\n"
    );
}

#[test]
fn an_assignment_kills_global_dependent_ranges() {
    // `b = 2` may run setters; `a` reads the non-local `x`, so it is not
    // inlined past the write even though `b` is unrelated
    assert_eq!(
        optimized("function f(x) { var a = x + 1; b = 2; return a; }"),
        "function f(x) {\n  var a = x + 1;\n  b = 2;\n  return a;\n}\n"
    );
}

#[test]
fn two_uses_are_never_inlined() {
    assert_eq!(
        optimized("function f(x) { var a = x + 1; return a + a; }"),
        "function f(x) {\n  var a = x + 1;\n  return a + a;\n}\n"
    );
}

#[test]
fn loop_bodies_never_see_outside_temporaries() {
    // `a` is used only inside the loop, so it survives; its own initializer
    // chain (`q`, used once before the loop) still collapses
    assert_eq!(
        optimized("function f(x) { var q = 1; var a = q; while (x) { h(a); } }"),
        "function f(x) {\n  var a = 1;\n  while (x) {\n    h(a);\n  }\n}\n"
    );
}

#[test]
fn elimination_cascades_through_local_chains() {
    assert_eq!(
        optimized("function f(p) { var q = 0; var a = q; if (p) { r = 1; } return a; }"),
        "function f(p) {\n  if (p) {\n    r = 1;\n  }\n  return 0;\n}\n"
    );
}

#[test]
fn optimizing_twice_changes_nothing() {
    let src = "function f(x) { var a = x + 1; var b = g(); b = b + a; return b; }";
    let once = optimized(src);
    let twice = {
        let ast = crate::parse::parse_program(&once).unwrap();
        let Ast::Toplevel(stmts) = ast else {
            panic!("expected toplevel");
        };
        let Some(Ast::Defun { name, args, mut body }) = stmts.into_iter().next() else {
            panic!("expected defun");
        };
        optimize_function(&mut body);
        crate::emit::collapse_blank_lines(&crate::emit::stmt_to_string(&Ast::Defun {
            name,
            args,
            body,
        }))
    };
    assert_eq!(once, twice);
}

#[test]
fn for_in_iteration_bindings_are_untouchable() {
    assert_eq!(
        optimized("function f(t) { for (var k in t) { h(k); } }"),
        "function f(t) {\n  for (var k in t) {\n    h(k);\n  }\n}\n"
    );
}
