use crate::ast::{Ast, Kind};
use crate::walk::{Visit, walk, walk_ref};

/// Constant-fold maximal `+` chains mixing numeric literals and names, in
/// place. The summed constant lands innermost: `x + 1 + y + 2` becomes
/// `3 + x + y`. Chains containing anything else are left alone.
pub fn fold_additions(node: &mut Ast) {
    walk(node, &mut |n, kind| {
        if kind == Kind::Binary {
            if let Ast::Binary { op, .. } = n {
                if op == "+" {
                    if let Some(folded) = fold_chain(n) {
                        return Visit::Replace(folded);
                    }
                }
            }
        }
        Visit::Continue
    });
}

fn fold_chain(root: &Ast) -> Option<Ast> {
    let mut names: Vec<String> = Vec::new();
    let mut sum = 0.0f64;
    let mut has_num = false;
    let mut ok = true;
    walk_ref(root, &mut |node, _| match node {
        Ast::Binary { op, .. } => {
            if op != "+" {
                ok = false;
            }
        }
        Ast::Name(name) => names.push(name.clone()),
        Ast::Num(value) => {
            sum += value;
            has_num = true;
        }
        _ => ok = false,
    });
    if !ok || !has_num {
        return None;
    }
    let mut rebuilt = Ast::Num(sum);
    for name in names {
        rebuilt = Ast::Binary {
            op: "+".to_owned(),
            left: Box::new(rebuilt),
            right: Box::new(Ast::Name(name)),
        };
    }
    Some(rebuilt)
}

#[cfg(test)]
fn folded(src: &str) -> String {
    let ast = crate::parse::parse_program(src).unwrap();
    let Ast::Toplevel(stmts) = ast else {
        panic!("expected toplevel");
    };
    let mut out = String::new();
    for mut stmt in stmts {
        fold_additions(&mut stmt);
        out.push_str(&crate::emit::stmt_to_string(&stmt));
    }
    out
}

#[test]
fn sums_literals_into_the_innermost_slot() {
    assert_eq!(folded("var a = 1 + 2 + x;"), "var a = 3 + x;\n");
    assert_eq!(folded("var a = x + 1 + y + 2;"), "var a = 3 + x + y;\n");
}

#[test]
fn all_literal_chains_become_one_number() {
    assert_eq!(folded("var a = 1 + 2 + 3;"), "var a = 6;\n");
}

#[test]
fn chains_without_a_literal_are_left_alone() {
    assert_eq!(folded("var a = x + y;"), "var a = x + y;\n");
}

#[test]
fn foreign_operands_abort_the_chain() {
    assert_eq!(folded("var a = f() + 1;"), "var a = f() + 1;\n");
    assert_eq!(folded("var a = 1 + 2 * 3;"), "var a = 1 + 2 * 3;\n");
    assert_eq!(folded("var a = h[0] + 1;"), "var a = h[0] + 1;\n");
}

#[test]
fn nested_chains_under_other_operators_still_fold() {
    assert_eq!(folded("var a = (1 + 2 + x) * y;"), "var a = (3 + x) * y;\n");
}

#[test]
fn folding_is_idempotent_on_recognized_chains() {
    let once = folded("var a = 1 + 2 + x;");
    assert_eq!(folded(&once), once);
}
