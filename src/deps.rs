use crate::ast::{Ast, Kind};
use crate::vars::VarTable;
use crate::walk::walk_ref;
use petgraph::prelude::*;
use std::collections::{HashMap, HashSet};

/// `x → y` means: the initializer of single-def binding `y` reads name `x`.
/// Targets are always single-def locals; sources may be any name.
pub struct AffectsGraph {
    graph: Graph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

/// Saturated closure: per source name, every binding whose recorded
/// initializer goes stale when that name changes.
pub type Dependents = HashMap<String, HashSet<String>>;

impl AffectsGraph {
    pub fn new() -> Self {
        AffectsGraph {
            graph: Graph::new(),
            index: HashMap::new(),
        }
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_owned());
        self.index.insert(name.to_owned(), idx);
        idx
    }

    pub fn add_edge(&mut self, src: &str, dst: &str) {
        let (s, d) = (self.node(src), self.node(dst));
        if self.graph.find_edge(s, d).is_none() {
            self.graph.add_edge(s, d, ());
        }
    }

    /// Transitive closure of the graph. Every edge already exists, so
    /// per-source reachability computes the classical worklist fixed point
    /// directly; a binding reachable from a non-local source is marked as
    /// depending on a global.
    pub fn saturate(&self, table: &mut VarTable) -> Dependents {
        let mut closure = Dependents::new();
        for (name, &start) in &self.index {
            let mut reach: HashSet<String> = HashSet::new();
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(nx) = dfs.next(&self.graph) {
                if nx != start {
                    reach.insert(self.graph[nx].clone());
                }
            }
            if !table.get(name).is_some_and(|i| i.is_local) {
                for target in &reach {
                    if let Some(info) = table.get_mut(target) {
                        info.depends_on_global = true;
                    }
                }
            }
            closure.insert(name.clone(), reach);
        }
        tracing::trace!(
            target: "deps",
            sources = closure.len(),
            edges = self.graph.edge_count(),
            "affects graph saturated"
        );
        closure
    }
}

impl Default for AffectsGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure node kinds: cannot call, construct, throw or reassign. `unary-prefix`
/// is admissible because the generated dialect never puts `++x`/`--x` in
/// initializer position.
fn is_simple_kind(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Name | Kind::Num | Kind::Str | Kind::Binary | Kind::Sub | Kind::UnaryPrefix
    )
}

/// Inspect every single-def initializer: purity, free names read, direct
/// affects edges, direct global dependence.
pub fn analyze_initializers(table: &mut VarTable) -> AffectsGraph {
    let mut affects = AffectsGraph::new();
    let singles: Vec<(String, Ast)> = table
        .iter()
        .filter(|(_, info)| info.is_single_def)
        .filter_map(|(name, info)| info.initial_value.clone().map(|v| (name.clone(), v)))
        .collect();

    for (name, init) in singles {
        let mut simple = true;
        let mut reads: Vec<String> = Vec::new();
        walk_ref(&init, &mut |node, kind| {
            if !is_simple_kind(kind) {
                simple = false;
            }
            if let Ast::Name(read) = node {
                if read != "undefined" {
                    reads.push(read.clone());
                }
            }
        });

        let mut global = false;
        for read in &reads {
            affects.add_edge(read, &name);
            if !table.get(read).is_some_and(|i| i.is_local) {
                global = true;
            }
        }
        if let Some(info) = table.get_mut(&name) {
            info.uses_only_simple_nodes = simple;
            if global {
                info.depends_on_global = true;
            }
        }
    }
    affects
}

#[cfg(test)]
fn analyzed(src: &str) -> (VarTable, Dependents) {
    let ast = crate::parse::parse_program(src).unwrap();
    let Ast::Toplevel(stmts) = ast else {
        panic!("expected toplevel");
    };
    let Some(Ast::Defun { mut body, .. }) = stmts.into_iter().next() else {
        panic!("expected defun");
    };
    let mut table = crate::vars::scan_vars(&mut body);
    let affects = analyze_initializers(&mut table);
    let closure = affects.saturate(&mut table);
    (table, closure)
}

#[test]
fn pure_initializers_are_recognized() {
    let (table, _) = analyzed("function f(x) { var a = x + 1; var b = h[x]; var c = -x; }");
    assert!(table["a"].uses_only_simple_nodes);
    assert!(table["b"].uses_only_simple_nodes);
    assert!(table["c"].uses_only_simple_nodes);
}

#[test]
fn calls_news_and_throws_are_not_simple() {
    let (table, _) = analyzed("function f() { var a = g(); var b = new T(); }");
    assert!(!table["a"].uses_only_simple_nodes);
    assert!(!table["b"].uses_only_simple_nodes);
}

#[test]
fn synthetic_undefined_is_pure_and_dependency_free() {
    let (table, closure) = analyzed("function f() { var a; }");
    assert!(table["a"].uses_only_simple_nodes);
    assert!(!table["a"].depends_on_global);
    assert!(!closure.contains_key("undefined"));
}

#[test]
fn closure_reaches_through_chains() {
    let (table, closure) =
        analyzed("function f() { var q = ext; var a = q + 1; var b = a; return b; }");
    // ext is non-local, so the whole chain depends on a global
    assert!(table["q"].depends_on_global);
    assert!(table["a"].depends_on_global);
    assert!(table["b"].depends_on_global);
    let from_ext = &closure["ext"];
    assert!(from_ext.contains("q") && from_ext.contains("a") && from_ext.contains("b"));
    let from_q = &closure["q"];
    assert!(from_q.contains("a") && from_q.contains("b") && !from_q.contains("q"));
}

#[test]
fn local_only_chains_stay_local() {
    let (table, closure) = analyzed("function f() { var q = 1; var a = q + 2; return a; }");
    assert!(!table["q"].depends_on_global);
    assert!(!table["a"].depends_on_global);
    assert!(closure["q"].contains("a"));
}
