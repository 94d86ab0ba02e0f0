use crate::ast::{Ast, CatchClause, SwitchCase, VarDecl};
use crate::errors::{LetheError, LetheResult};
use std::cell::RefCell;
use tree_sitter::{Language, Node};

thread_local! {
    static PARSER: RefCell<tree_sitter::Parser> = RefCell::new(tree_sitter::Parser::new());
}

/// Parse a whole JavaScript source into a `toplevel` node.
///
/// Anything the generated-code dialect cannot express (arrow functions,
/// classes, template strings, `let`/`const`, …) is a fatal input-shape error,
/// as is any syntax error reported by the grammar.
pub fn parse_program(src: &str) -> LetheResult<Ast> {
    let tree = PARSER.with(|cell| {
        let mut parser = cell.borrow_mut();
        parser.set_language(&Language::from(tree_sitter_javascript::LANGUAGE))?;
        parser
            .parse(src, None)
            .ok_or_else(|| LetheError::Parse("tree-sitter produced no tree".to_owned()))
    })?;

    let root = tree.root_node();
    if root.has_error() {
        let at = first_error(root).unwrap_or(root).start_position();
        return Err(LetheError::Parse(format!(
            "syntax error at line {}, column {}",
            at.row + 1,
            at.column + 1
        )));
    }

    let mut stmts = Vec::new();
    for child in real_children(root) {
        stmts.push(stmt(child, src)?);
    }
    Ok(Ast::Toplevel(stmts))
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    Some(node)
}

fn text<'a>(node: Node, src: &'a str) -> &'a str {
    &src[node.byte_range()]
}

/// Named children minus comments (tree-sitter injects them everywhere).
fn real_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment" && c.kind() != "hash_bang_line")
        .collect()
}

fn unsupported(node: Node) -> LetheError {
    LetheError::Unsupported {
        kind: node.kind().to_owned(),
        line: node.start_position().row + 1,
    }
}

fn field<'a>(node: Node<'a>, name: &str) -> LetheResult<Node<'a>> {
    node.child_by_field_name(name).ok_or_else(|| {
        LetheError::Parse(format!(
            "`{}` node without `{name}` at line {}",
            node.kind(),
            node.start_position().row + 1
        ))
    })
}

/// `if (…)` / `while (…)` conditions arrive wrapped in a
/// `parenthesized_expression`; `expr` unwraps it, so this is just a reader.
fn paren_expr(node: Node, src: &str) -> LetheResult<Ast> {
    expr(node, src)
}

fn block_stmts(node: Node, src: &str) -> LetheResult<Vec<Ast>> {
    real_children(node)
        .into_iter()
        .map(|c| stmt(c, src))
        .collect()
}

fn stmt(node: Node, src: &str) -> LetheResult<Ast> {
    match node.kind() {
        "statement_block" => Ok(Ast::Block(block_stmts(node, src)?)),
        "expression_statement" => {
            let inner = real_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| unsupported(node))?;
            Ok(Ast::Stat(Box::new(expr(inner, src)?)))
        }
        "variable_declaration" => var_declaration(node, src),
        "function_declaration" => {
            let (name, args, body) = function_parts(node, src)?;
            let name = name.ok_or_else(|| unsupported(node))?;
            Ok(Ast::Defun { name, args, body })
        }
        "if_statement" => {
            let cond = paren_expr(field(node, "condition")?, src)?;
            let then = stmt(field(node, "consequence")?, src)?;
            let els = match node.child_by_field_name("alternative") {
                Some(clause) => {
                    // else_clause wraps the actual statement
                    let inner = real_children(clause)
                        .into_iter()
                        .next()
                        .ok_or_else(|| unsupported(clause))?;
                    Some(Box::new(stmt(inner, src)?))
                }
                None => None,
            };
            Ok(Ast::If {
                cond: Box::new(cond),
                then: Box::new(then),
                els,
            })
        }
        "while_statement" => Ok(Ast::While {
            cond: Box::new(paren_expr(field(node, "condition")?, src)?),
            body: Box::new(stmt(field(node, "body")?, src)?),
        }),
        "do_statement" => Ok(Ast::Do {
            cond: Box::new(paren_expr(field(node, "condition")?, src)?),
            body: Box::new(stmt(field(node, "body")?, src)?),
        }),
        "for_statement" => for_statement(node, src),
        "for_in_statement" => for_in_statement(node, src),
        "switch_statement" => switch_statement(node, src),
        "try_statement" => try_statement(node, src),
        "return_statement" => {
            let value = real_children(node)
                .into_iter()
                .next()
                .map(|c| expr(c, src).map(Box::new))
                .transpose()?;
            Ok(Ast::Return(value))
        }
        "throw_statement" => {
            let value = real_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| unsupported(node))?;
            Ok(Ast::Throw(Box::new(expr(value, src)?)))
        }
        "break_statement" => Ok(Ast::Break(
            node.child_by_field_name("label")
                .map(|l| text(l, src).to_owned()),
        )),
        "continue_statement" => Ok(Ast::Continue(
            node.child_by_field_name("label")
                .map(|l| text(l, src).to_owned()),
        )),
        "labeled_statement" => Ok(Ast::Label {
            name: text(field(node, "label")?, src).to_owned(),
            body: Box::new(stmt(field(node, "body")?, src)?),
        }),
        "debugger_statement" => Ok(Ast::Debugger),
        "empty_statement" => Ok(Ast::empty()),
        _ => Err(unsupported(node)),
    }
}

fn var_declaration(node: Node, src: &str) -> LetheResult<Ast> {
    let mut decls = Vec::new();
    for declarator in real_children(node) {
        if declarator.kind() != "variable_declarator" {
            return Err(unsupported(declarator));
        }
        let name = field(declarator, "name")?;
        if name.kind() != "identifier" {
            // destructuring patterns are outside the dialect
            return Err(unsupported(name));
        }
        let init = declarator
            .child_by_field_name("value")
            .map(|v| expr(v, src))
            .transpose()?;
        decls.push(VarDecl {
            name: text(name, src).to_owned(),
            init,
        });
    }
    Ok(Ast::Var(decls))
}

fn function_parts(node: Node, src: &str) -> LetheResult<(Option<String>, Vec<String>, Vec<Ast>)> {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, src).to_owned());
    let mut args = Vec::new();
    for param in real_children(field(node, "parameters")?) {
        if param.kind() != "identifier" {
            return Err(unsupported(param));
        }
        args.push(text(param, src).to_owned());
    }
    let body = block_stmts(field(node, "body")?, src)?;
    Ok((name, args, body))
}

fn for_statement(node: Node, src: &str) -> LetheResult<Ast> {
    let init = match node.child_by_field_name("initializer") {
        Some(n) if n.kind() == "variable_declaration" => Some(var_declaration(n, src)?),
        Some(n) if n.kind() == "expression_statement" => {
            let inner = real_children(n)
                .into_iter()
                .next()
                .ok_or_else(|| unsupported(n))?;
            Some(expr(inner, src)?)
        }
        Some(n) if n.kind() == "empty_statement" => None,
        Some(n) => return Err(unsupported(n)),
        None => None,
    };
    let cond = match node.child_by_field_name("condition") {
        Some(n) if n.kind() == "expression_statement" => {
            let inner = real_children(n)
                .into_iter()
                .next()
                .ok_or_else(|| unsupported(n))?;
            Some(expr(inner, src)?)
        }
        Some(n) if n.kind() == "empty_statement" => None,
        Some(n) => return Err(unsupported(n)),
        None => None,
    };
    let step = node
        .child_by_field_name("increment")
        .map(|n| expr(n, src))
        .transpose()?;
    Ok(Ast::For {
        init: init.map(Box::new),
        cond: cond.map(Box::new),
        step: step.map(Box::new),
        body: Box::new(stmt(field(node, "body")?, src)?),
    })
}

fn for_in_statement(node: Node, src: &str) -> LetheResult<Ast> {
    let op = field(node, "operator")?;
    if text(op, src) != "in" {
        // for-of is outside the dialect
        return Err(unsupported(node));
    }
    let left = field(node, "left")?;
    let decl = match node.child_by_field_name("kind") {
        Some(kw) if text(kw, src) == "var" => {
            if left.kind() != "identifier" {
                return Err(unsupported(left));
            }
            Ast::Var(vec![VarDecl {
                name: text(left, src).to_owned(),
                init: None,
            }])
        }
        Some(kw) => return Err(unsupported(kw)),
        None => expr(left, src)?,
    };
    Ok(Ast::ForIn {
        decl: Box::new(decl),
        obj: Box::new(expr(field(node, "right")?, src)?),
        body: Box::new(stmt(field(node, "body")?, src)?),
    })
}

fn switch_statement(node: Node, src: &str) -> LetheResult<Ast> {
    let disc = paren_expr(field(node, "value")?, src)?;
    let mut cases = Vec::new();
    for arm in real_children(field(node, "body")?) {
        match arm.kind() {
            "switch_case" => {
                let value = field(arm, "value")?;
                let body = real_children(arm)
                    .into_iter()
                    .filter(|c| c.id() != value.id())
                    .map(|c| stmt(c, src))
                    .collect::<LetheResult<Vec<_>>>()?;
                cases.push(SwitchCase {
                    test: Some(expr(value, src)?),
                    body,
                });
            }
            "switch_default" => {
                let body = real_children(arm)
                    .into_iter()
                    .map(|c| stmt(c, src))
                    .collect::<LetheResult<Vec<_>>>()?;
                cases.push(SwitchCase { test: None, body });
            }
            _ => return Err(unsupported(arm)),
        }
    }
    Ok(Ast::Switch {
        disc: Box::new(disc),
        cases,
    })
}

fn try_statement(node: Node, src: &str) -> LetheResult<Ast> {
    let body = block_stmts(field(node, "body")?, src)?;
    let catch = match node.child_by_field_name("handler") {
        Some(handler) => {
            let param = field(handler, "parameter")?;
            if param.kind() != "identifier" {
                return Err(unsupported(param));
            }
            Some(CatchClause {
                param: text(param, src).to_owned(),
                body: block_stmts(field(handler, "body")?, src)?,
            })
        }
        None => None,
    };
    let finally = node
        .child_by_field_name("finalizer")
        .map(|f| block_stmts(field(f, "body")?, src).map(Some))
        .transpose()?
        .flatten();
    Ok(Ast::Try {
        body,
        catch,
        finally,
    })
}

fn expr(node: Node, src: &str) -> LetheResult<Ast> {
    match node.kind() {
        "identifier" => Ok(Ast::Name(text(node, src).to_owned())),
        // Atoms lower to names, as the dialect's upstream parser did.
        "this" | "true" | "false" | "null" | "undefined" => {
            Ok(Ast::Name(node.kind().to_owned()))
        }
        "number" => Ok(Ast::Num(parse_number(text(node, src), node)?)),
        "string" => Ok(Ast::Str(text(node, src).to_owned())),
        "parenthesized_expression" => {
            let inner = real_children(node)
                .into_iter()
                .next()
                .ok_or_else(|| unsupported(node))?;
            expr(inner, src)
        }
        "binary_expression" => Ok(Ast::Binary {
            op: text(field(node, "operator")?, src).to_owned(),
            left: Box::new(expr(field(node, "left")?, src)?),
            right: Box::new(expr(field(node, "right")?, src)?),
        }),
        "unary_expression" => Ok(Ast::UnaryPrefix {
            op: text(field(node, "operator")?, src).to_owned(),
            expr: Box::new(expr(field(node, "argument")?, src)?),
        }),
        "update_expression" => {
            let op = field(node, "operator")?;
            let arg = field(node, "argument")?;
            let inner = Box::new(expr(arg, src)?);
            if op.start_byte() < arg.start_byte() {
                Ok(Ast::UnaryPrefix {
                    op: text(op, src).to_owned(),
                    expr: inner,
                })
            } else {
                Ok(Ast::UnaryPostfix {
                    op: text(op, src).to_owned(),
                    expr: inner,
                })
            }
        }
        "assignment_expression" => Ok(Ast::Assign {
            op: None,
            target: Box::new(expr(field(node, "left")?, src)?),
            value: Box::new(expr(field(node, "right")?, src)?),
        }),
        "augmented_assignment_expression" => {
            let op_text = text(field(node, "operator")?, src);
            let op = op_text
                .strip_suffix('=')
                .ok_or_else(|| unsupported(node))?;
            Ok(Ast::Assign {
                op: Some(op.to_owned()),
                target: Box::new(expr(field(node, "left")?, src)?),
                value: Box::new(expr(field(node, "right")?, src)?),
            })
        }
        "member_expression" => Ok(Ast::Dot {
            obj: Box::new(expr(field(node, "object")?, src)?),
            prop: text(field(node, "property")?, src).to_owned(),
        }),
        "subscript_expression" => Ok(Ast::Sub {
            obj: Box::new(expr(field(node, "object")?, src)?),
            index: Box::new(expr(field(node, "index")?, src)?),
        }),
        "call_expression" => {
            let args_node = field(node, "arguments")?;
            if args_node.kind() != "arguments" {
                // template-string invocation
                return Err(unsupported(args_node));
            }
            Ok(Ast::Call {
                callee: Box::new(expr(field(node, "function")?, src)?),
                args: real_children(args_node)
                    .into_iter()
                    .map(|a| expr(a, src))
                    .collect::<LetheResult<Vec<_>>>()?,
            })
        }
        "new_expression" => {
            let args = match node.child_by_field_name("arguments") {
                Some(args_node) => real_children(args_node)
                    .into_iter()
                    .map(|a| expr(a, src))
                    .collect::<LetheResult<Vec<_>>>()?,
                None => Vec::new(),
            };
            Ok(Ast::New {
                callee: Box::new(expr(field(node, "constructor")?, src)?),
                args,
            })
        }
        "ternary_expression" => Ok(Ast::Conditional {
            cond: Box::new(expr(field(node, "condition")?, src)?),
            then: Box::new(expr(field(node, "consequence")?, src)?),
            els: Box::new(expr(field(node, "alternative")?, src)?),
        }),
        "sequence_expression" => {
            let parts = real_children(node)
                .into_iter()
                .map(|c| expr(c, src))
                .collect::<LetheResult<Vec<_>>>()?;
            let mut parts = parts.into_iter();
            let first = parts.next().ok_or_else(|| unsupported(node))?;
            Ok(parts.fold(first, |acc, next| {
                Ast::Seq(Box::new(acc), Box::new(next))
            }))
        }
        "function_expression" | "function" => {
            let (name, args, body) = function_parts(node, src)?;
            Ok(Ast::Function { name, args, body })
        }
        "array" => Ok(Ast::Array(
            real_children(node)
                .into_iter()
                .map(|c| expr(c, src))
                .collect::<LetheResult<Vec<_>>>()?,
        )),
        "object" => {
            let mut pairs = Vec::new();
            for entry in real_children(node) {
                match entry.kind() {
                    "pair" => {
                        let key = field(entry, "key")?;
                        pairs.push((
                            text(key, src).to_owned(),
                            expr(field(entry, "value")?, src)?,
                        ));
                    }
                    "shorthand_property_identifier" => {
                        let name = text(entry, src).to_owned();
                        pairs.push((name.clone(), Ast::Name(name)));
                    }
                    _ => return Err(unsupported(entry)),
                }
            }
            Ok(Ast::Object(pairs))
        }
        _ => Err(unsupported(node)),
    }
}

fn parse_number(raw: &str, node: Node) -> LetheResult<f64> {
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok().map(|v| v as f64)
    } else {
        raw.parse::<f64>().ok()
    };
    parsed.ok_or_else(|| {
        LetheError::Parse(format!(
            "unreadable number literal `{raw}` at line {}",
            node.start_position().row + 1
        ))
    })
}

#[test]
fn lowers_a_minimal_function() {
    use crate::ast::Kind;
    let ast = parse_program("function f(x) { var a = x + 1; return a; }").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::Defun { name, args, body } = &stmts[0] else {
        panic!("expected defun");
    };
    assert_eq!(name, "f");
    assert_eq!(args, &vec!["x".to_owned()]);
    assert_eq!(body[0].kind(), Kind::Var);
    assert_eq!(body[1].kind(), Kind::Return);
}

#[test]
fn atoms_lower_to_names() {
    let ast = parse_program("x = undefined; y = true;").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::Stat(assign) = &stmts[0] else {
        panic!("expected stat");
    };
    let Ast::Assign { value, .. } = &**assign else {
        panic!("expected assign");
    };
    assert_eq!(**value, Ast::undefined());
}

#[test]
fn update_expressions_keep_their_fixity() {
    let ast = parse_program("a++; --b;").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::Stat(post) = &stmts[0] else {
        panic!("expected stat");
    };
    assert!(matches!(&**post, Ast::UnaryPostfix { op, .. } if op == "++"));
    let Ast::Stat(pre) = &stmts[1] else {
        panic!("expected stat");
    };
    assert!(matches!(&**pre, Ast::UnaryPrefix { op, .. } if op == "--"));
}

#[test]
fn compound_assignment_keeps_operator() {
    let ast = parse_program("x += 2;").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::Stat(assign) = &stmts[0] else {
        panic!("expected stat");
    };
    assert!(matches!(&**assign, Ast::Assign { op: Some(op), .. } if op == "+"));
}

#[test]
fn for_in_var_binding_lowers_to_var() {
    use crate::ast::Kind;
    let ast = parse_program("for (var k in table) { k; }").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::ForIn { decl, .. } = &stmts[0] else {
        panic!("expected for-in");
    };
    assert_eq!(decl.kind(), Kind::Var);
}

#[test]
fn syntax_errors_are_fatal() {
    let err = parse_program("function f( {").unwrap_err();
    assert!(matches!(err, LetheError::Parse(_)));
}

#[test]
fn dialect_violations_are_fatal() {
    let err = parse_program("const x = () => 1;").unwrap_err();
    assert!(matches!(err, LetheError::Unsupported { .. }));
}

#[test]
fn hex_and_decimal_numbers_parse() {
    let ast = parse_program("x = 0x10 + 2.5;").unwrap();
    let Ast::Toplevel(stmts) = &ast else {
        panic!("expected toplevel");
    };
    let Ast::Stat(assign) = &stmts[0] else {
        panic!("expected stat");
    };
    let Ast::Assign { value, .. } = &**assign else {
        panic!("expected assign");
    };
    let Ast::Binary { left, right, .. } = &**value else {
        panic!("expected binary");
    };
    assert_eq!(**left, Ast::Num(16.0));
    assert_eq!(**right, Ast::Num(2.5));
}
