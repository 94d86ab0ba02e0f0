use crate::ast::{Ast, Kind};
use crate::deps::Dependents;
use crate::vars::VarTable;
use crate::walk::walk_ref;
use std::collections::HashSet;

/// Walk the body with a set of currently-live single-def bindings: those whose
/// substitution at the point reached so far would still be faithful. A use of
/// a binding that is not live anymore gets `deps_mutated_in_live_range`.
///
/// The traversal is block-structured, not flat: branching constructs join by
/// intersection, loops empty the set on both sides (no back-edge modeling).
pub fn analyze_live_ranges(body: &[Ast], deps: &Dependents, table: &mut VarTable) {
    let mut live: HashSet<String> = HashSet::new();
    for stmt in body {
        scan(stmt, &mut live, deps, table);
    }
}

fn scan(node: &Ast, live: &mut HashSet<String>, deps: &Dependents, table: &mut VarTable) {
    match node {
        Ast::Switch { disc, cases } => {
            scan(disc, live, deps, table);
            let snapshot = live.clone();
            let mut merged = snapshot.clone();
            for case in cases {
                let mut branch = snapshot.clone();
                if let Some(test) = &case.test {
                    scan(test, &mut branch, deps, table);
                }
                for stmt in &case.body {
                    scan(stmt, &mut branch, deps, table);
                }
                // killed on any branch means killed in the join
                merged.retain(|v| branch.contains(v));
            }
            *live = merged;
        }
        Ast::If { cond, then, els } => {
            let mut branches: Vec<&Ast> = vec![cond, then];
            if let Some(e) = els {
                branches.push(e);
            }
            join_branches(&branches, live, deps, table);
        }
        Ast::Try {
            body,
            catch,
            finally,
        } => {
            let snapshot = live.clone();
            let mut merged = snapshot.clone();
            let mut sections: Vec<&[Ast]> = vec![body.as_slice()];
            if let Some(c) = catch {
                sections.push(c.body.as_slice());
            }
            if let Some(f) = finally {
                sections.push(f.as_slice());
            }
            for section in sections {
                let mut branch = snapshot.clone();
                for stmt in section {
                    scan(stmt, &mut branch, deps, table);
                }
                merged.retain(|v| branch.contains(v));
            }
            *live = merged;
        }
        Ast::Do { .. } | Ast::While { .. } | Ast::For { .. } | Ast::ForIn { .. } => {
            // nothing live survives into a loop, and nothing escapes one
            live.clear();
            let skip_iter_var = node.kind() == Kind::ForIn;
            for child in node.children() {
                if skip_iter_var && child.kind() == Kind::Var {
                    continue;
                }
                scan(child, live, deps, table);
            }
            live.clear();
        }
        Ast::Var(decls) => {
            for d in decls {
                if let Some(init) = &d.init {
                    scan(init, live, deps, table);
                }
                if table.get(&d.name).is_some_and(|i| i.is_single_def) {
                    live.insert(d.name.clone());
                }
                // the name is defined now; anything recorded against its
                // earlier (undefined) slot is stale
                kill_dependents(&d.name, deps, live);
            }
        }
        Ast::Assign { target, .. } => {
            if let Some(base) = base_name(target) {
                kill_dependents(base, deps, live);
            }
            let used = names_in(node);
            // setters and coercions may touch globals
            live.retain(|v| {
                !(table.get(v).is_some_and(|i| i.depends_on_global) && !used.contains(v))
            });
            for child in node.children() {
                scan(child, live, deps, table);
            }
        }
        Ast::UnaryPrefix { op, expr } | Ast::UnaryPostfix { op, expr }
            if matches!(op.as_str(), "++" | "--") =>
        {
            if let Some(base) = base_name(expr) {
                kill_dependents(base, deps, live);
            }
            scan(expr, live, deps, table);
        }
        Ast::Call { .. } | Ast::New { .. } | Ast::Throw(_) | Ast::Label { .. } | Ast::Debugger => {
            // may mutate globals, may not return: only bindings fully captured
            // by locals and consumed in this very statement survive
            let used = names_in(node);
            live.retain(|v| {
                !table.get(v).is_some_and(|i| i.depends_on_global) && used.contains(v)
            });
            for child in node.children() {
                scan(child, live, deps, table);
            }
        }
        Ast::Name(n) => {
            if let Some(info) = table.get_mut(n) {
                if info.is_single_def && !live.contains(n) {
                    info.deps_mutated_in_live_range = true;
                }
            }
        }
        _ => {
            for child in node.children() {
                scan(child, live, deps, table);
            }
        }
    }
}

fn join_branches(branches: &[&Ast], live: &mut HashSet<String>, deps: &Dependents, table: &mut VarTable) {
    let snapshot = live.clone();
    let mut merged = snapshot.clone();
    for branch_node in branches {
        let mut branch = snapshot.clone();
        scan(branch_node, &mut branch, deps, table);
        merged.retain(|v| branch.contains(v));
    }
    *live = merged;
}

fn kill_dependents(name: &str, deps: &Dependents, live: &mut HashSet<String>) {
    if let Some(set) = deps.get(name) {
        for victim in set {
            live.remove(victim);
        }
    }
}

/// First `name` under a mutation target: `a[i].b = …` mutates through `a`.
fn base_name(mut target: &Ast) -> Option<&str> {
    loop {
        match target {
            Ast::Name(n) => return Some(n),
            Ast::Sub { obj, .. } | Ast::Dot { obj, .. } => target = obj,
            _ => return None,
        }
    }
}

fn names_in(node: &Ast) -> HashSet<String> {
    let mut out = HashSet::new();
    walk_ref(node, &mut |n, _| {
        if let Ast::Name(name) = n {
            out.insert(name.clone());
        }
    });
    out
}

#[cfg(test)]
fn flags_for(src: &str) -> VarTable {
    let ast = crate::parse::parse_program(src).unwrap();
    let Ast::Toplevel(stmts) = ast else {
        panic!("expected toplevel");
    };
    let Some(Ast::Defun { mut body, .. }) = stmts.into_iter().next() else {
        panic!("expected defun");
    };
    let mut table = crate::vars::scan_vars(&mut body);
    let affects = crate::deps::analyze_initializers(&mut table);
    let closure = affects.saturate(&mut table);
    analyze_live_ranges(&body, &closure, &mut table);
    table
}

#[test]
fn straight_line_use_stays_live() {
    let table = flags_for("function f(x) { var a = x + 1; return a; }");
    assert!(!table["a"].deps_mutated_in_live_range);
}

#[test]
fn dependency_write_kills_the_range() {
    let table = flags_for("function f(x) { var a = x + 1; x = 2; return a; }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn dependency_increment_kills_the_range() {
    let table = flags_for("function f(x) { var a = x + 1; x++; return a; }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn subscript_write_kills_through_the_base() {
    let table = flags_for("function f(x) { var a = x[0]; x[1] = 9; return a; }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn call_kills_global_dependent_bindings() {
    let table = flags_for("function f(x) { var a = x; g(); return a; }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn call_spares_a_local_binding_consumed_in_it() {
    let table = flags_for("function f() { var q = 1; var a = q; g(a); }");
    assert!(!table["a"].deps_mutated_in_live_range);
}

#[test]
fn unrelated_local_assign_keeps_range_alive() {
    let table = flags_for("function f() { var q = 1; var a = q; r = 2; return a; }");
    assert!(!table["a"].deps_mutated_in_live_range);
}

#[test]
fn branch_kill_poisons_the_join() {
    let table = flags_for(
        "function f(x, p) { var q = 1; var a = q; if (p) { q = 2; } else { r = 3; } return a; }",
    );
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn both_branches_clean_keeps_the_range() {
    let table =
        flags_for("function f(p) { var q = 1; var a = q; if (p) { r = 2; } return a; }");
    assert!(!table["a"].deps_mutated_in_live_range);
}

#[test]
fn loops_are_a_liveness_barrier() {
    let table = flags_for("function f(x) { var q = 1; var a = q; while (x) { h(a); } }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn loop_local_bindings_do_not_escape() {
    let table = flags_for("function f(x) { while (x) { var a = 1; } return a; }");
    assert!(table["a"].deps_mutated_in_live_range);
}

#[test]
fn redefinition_kills_bindings_reading_the_old_slot() {
    // b records a read of the not-yet-defined q, then q gets defined
    let table = flags_for("function f() { var b = q; var q = 1; return b; }");
    assert!(table["b"].deps_mutated_in_live_range);
}

#[test]
fn switch_cases_join_by_intersection() {
    let table = flags_for(
        "function f(x) { var q = 1; var a = q; switch (x) { case 1: q = 2; break; default: r = 0; } return a; }",
    );
    assert!(table["a"].deps_mutated_in_live_range);
}
