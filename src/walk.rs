use crate::ast::{Ast, Kind};

/// Observer verdict for one visited node. Each call returns a fresh value; no
/// state is carried between calls.
pub enum Visit {
    /// Keep the node and descend into its children.
    Continue,
    /// Splice the given subtree into the parent slot; the replaced subtree is
    /// not traversed.
    Replace(Ast),
    /// Abort the whole traversal.
    Stop,
}

/// Pre-order traversal with in-place replacement. Returns `false` when the
/// observer requested a stop.
///
/// A `for-in` child of kind `var` is never visited: the iterated binding is
/// opaque to every pass.
pub fn walk<F>(node: &mut Ast, f: &mut F) -> bool
where
    F: FnMut(&mut Ast, Kind) -> Visit,
{
    match f(node, node.kind()) {
        Visit::Replace(subtree) => {
            *node = subtree;
            true
        }
        Visit::Stop => false,
        Visit::Continue => {
            let skip_iter_var = node.kind() == Kind::ForIn;
            for child in node.children_mut() {
                if skip_iter_var && child.kind() == Kind::Var {
                    continue;
                }
                if !walk(child, f) {
                    return false;
                }
            }
            true
        }
    }
}

/// Read-only twin of [`walk`]: same order, same `for-in` exception, no
/// replacement protocol.
pub fn walk_ref<F>(node: &Ast, f: &mut F)
where
    F: FnMut(&Ast, Kind),
{
    f(node, node.kind());
    let skip_iter_var = node.kind() == Kind::ForIn;
    for child in node.children() {
        if skip_iter_var && child.kind() == Kind::Var {
            continue;
        }
        walk_ref(child, f);
    }
}

#[cfg(test)]
fn name(n: &str) -> Ast {
    Ast::Name(n.to_owned())
}

#[test]
fn replacement_splices_into_parent_slot() {
    let mut tree = Ast::Binary {
        op: "+".to_owned(),
        left: Box::new(name("a")),
        right: Box::new(name("b")),
    };
    walk(&mut tree, &mut |node, kind| {
        if kind == Kind::Name && matches!(node, Ast::Name(n) if n == "a") {
            return Visit::Replace(Ast::Num(7.0));
        }
        Visit::Continue
    });
    let Ast::Binary { left, .. } = &tree else {
        panic!("tree shape changed");
    };
    assert_eq!(**left, Ast::Num(7.0));
}

#[test]
fn replaced_subtree_is_not_revisited() {
    let mut tree = Ast::Stat(Box::new(name("a")));
    let mut after_replace = 0;
    walk(&mut tree, &mut |node, _| {
        if matches!(node, Ast::Name(n) if n == "a") {
            return Visit::Replace(Ast::Binary {
                op: "+".to_owned(),
                left: Box::new(name("x")),
                right: Box::new(name("y")),
            });
        }
        if matches!(node, Ast::Name(_)) {
            after_replace += 1;
        }
        Visit::Continue
    });
    assert_eq!(after_replace, 0, "spliced subtree must not be traversed");
}

#[test]
fn stop_aborts_the_whole_traversal() {
    let mut tree = Ast::Block(vec![
        Ast::Stat(Box::new(name("a"))),
        Ast::Stat(Box::new(name("b"))),
    ]);
    let mut seen = Vec::new();
    let finished = walk(&mut tree, &mut |node, kind| {
        if let Ast::Name(n) = node {
            seen.push(n.clone());
            if kind == Kind::Name && n == "a" {
                return Visit::Stop;
            }
        }
        Visit::Continue
    });
    assert!(!finished);
    assert_eq!(seen, vec!["a".to_owned()]);
}

#[test]
fn for_in_iteration_var_is_skipped() {
    use crate::ast::VarDecl;
    let mut tree = Ast::ForIn {
        decl: Box::new(Ast::Var(vec![VarDecl {
            name: "k".to_owned(),
            init: None,
        }])),
        obj: Box::new(name("table")),
        body: Box::new(Ast::Block(vec![])),
    };
    let mut kinds = Vec::new();
    walk(&mut tree, &mut |_, kind| {
        kinds.push(kind);
        Visit::Continue
    });
    assert!(!kinds.contains(&Kind::Var));
    assert!(kinds.contains(&Kind::Name));
}

#[test]
fn walk_ref_sees_every_node_once() {
    let tree = Ast::Sub {
        obj: Box::new(name("heap")),
        index: Box::new(Ast::Num(3.0)),
    };
    let mut count = 0;
    walk_ref(&tree, &mut |_, _| count += 1);
    assert_eq!(count, 3);
}
