use crate::ast::{Ast, Kind};
use crate::walk::{Visit, walk};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Per-name facts, filled in monotonically by the scan, the initializer
/// analysis and the live-range pass, then read by the rewriter.
#[derive(Debug, Default, Clone)]
pub struct VarInfo {
    /// declared by a `var` in this function body
    pub is_local: bool,
    /// exactly one declaration, never reassigned, incremented or decremented
    pub is_single_def: bool,
    /// `name` occurrences after the declaration, locality notwithstanding
    pub use_count: usize,
    /// the declared initializer, `undefined` synthesized when absent
    pub initial_value: Option<Ast>,
    /// every node of the initializer is of a side-effect-free kind
    pub uses_only_simple_nodes: bool,
    /// transitively reads at least one non-local free name
    pub depends_on_global: bool,
    /// some use sits after a point where a dependency may have been mutated
    pub deps_mutated_in_live_range: bool,
}

pub type VarTable = HashMap<String, VarInfo>;

/// One pass over the body: locality, single-definition status, use counts and
/// recorded initializers. Names referenced before (or without) a declaration
/// enter the table with single-def already cleared.
pub fn scan_vars(body: &mut [Ast]) -> VarTable {
    let mut table = VarTable::new();
    for stmt in body.iter_mut() {
        walk(stmt, &mut |node, kind| {
            match kind {
                Kind::Var => {
                    if let Ast::Var(decls) = node {
                        for d in decls {
                            let init = d.init.clone().unwrap_or_else(Ast::undefined);
                            match table.entry(d.name.clone()) {
                                Entry::Vacant(e) => {
                                    e.insert(VarInfo {
                                        is_local: true,
                                        is_single_def: true,
                                        initial_value: Some(init),
                                        ..VarInfo::default()
                                    });
                                }
                                Entry::Occupied(mut e) => {
                                    // re-declaration, or a reference got here first
                                    let info = e.get_mut();
                                    info.is_local = true;
                                    info.is_single_def = false;
                                    info.use_count = 0;
                                    info.initial_value = Some(init);
                                }
                            }
                        }
                    }
                }
                Kind::Name => {
                    if let Ast::Name(n) = node {
                        match table.entry(n.clone()) {
                            Entry::Occupied(mut e) => e.get_mut().use_count += 1,
                            // reference before (or without) any declaration:
                            // the default entry has single-def cleared
                            Entry::Vacant(e) => {
                                e.insert(VarInfo::default());
                            }
                        }
                    }
                }
                Kind::Assign => {
                    if let Ast::Assign { target, .. } = node {
                        if let Ast::Name(n) = target.as_ref() {
                            if let Some(info) = table.get_mut(n) {
                                info.is_single_def = false;
                            }
                        }
                    }
                }
                Kind::UnaryPrefix | Kind::UnaryPostfix => {
                    if let Ast::UnaryPrefix { op, expr } | Ast::UnaryPostfix { op, expr } = node {
                        if matches!(op.as_str(), "++" | "--") {
                            if let Ast::Name(n) = expr.as_ref() {
                                if let Some(info) = table.get_mut(n) {
                                    info.is_single_def = false;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
            Visit::Continue
        });
    }
    tracing::trace!(
        target: "vars",
        names = table.len(),
        locals = table.values().filter(|i| i.is_local).count(),
        "variable scan done"
    );
    table
}

#[cfg(test)]
fn table_for(src: &str) -> VarTable {
    let ast = crate::parse::parse_program(src).unwrap();
    let Ast::Toplevel(stmts) = ast else {
        panic!("expected toplevel");
    };
    let Some(Ast::Defun { mut body, .. }) = stmts.into_iter().next() else {
        panic!("expected defun");
    };
    scan_vars(&mut body)
}

#[test]
fn single_def_with_one_use() {
    let table = table_for("function f(x) { var a = x + 1; return a; }");
    let a = &table["a"];
    assert!(a.is_local && a.is_single_def);
    assert_eq!(a.use_count, 1);
    assert_eq!(a.initial_value.as_ref().map(Ast::kind), Some(Kind::Binary));
}

#[test]
fn reassignment_clears_single_def() {
    let table = table_for("function f() { var a = 1; a = 2; return a; }");
    assert!(!table["a"].is_single_def);
}

#[test]
fn increment_clears_single_def() {
    let table = table_for("function f() { var a = 1; a++; return a; }");
    assert!(!table["a"].is_single_def);
    let table = table_for("function f() { var b = 1; --b; return b; }");
    assert!(!table["b"].is_single_def);
}

#[test]
fn redeclaration_clears_single_def() {
    let table = table_for("function f() { var a = 1; var a = 2; return a; }");
    assert!(!table["a"].is_single_def);
}

#[test]
fn use_before_declaration_clears_single_def() {
    let table = table_for("function f() { g(a); var a = 1; }");
    assert!(!table["a"].is_single_def);
    assert!(table["a"].is_local);
}

#[test]
fn missing_initializer_synthesizes_undefined() {
    let table = table_for("function f() { var a; return a; }");
    assert_eq!(table["a"].initial_value, Some(Ast::undefined()));
    assert!(table["a"].is_single_def);
}

#[test]
fn free_names_are_counted_but_never_single_def() {
    let table = table_for("function f() { ext(); ext(); ext(); }");
    let ext = &table["ext"];
    assert!(!ext.is_local && !ext.is_single_def);
    // the first sighting creates the entry, later ones count
    assert_eq!(ext.use_count, 2);
}

#[test]
fn member_writes_do_not_clear_single_def() {
    let table = table_for("function f(x) { var a = x; a.b = 1; return a; }");
    assert!(table["a"].is_single_def, "a itself is never reassigned");
}
