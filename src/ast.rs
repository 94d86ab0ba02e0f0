use std::fmt;

/// Kind tags for the generated-code dialect. The set is closed: the parser
/// front-end rejects anything it cannot lower to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Toplevel,
    Block,
    Stat,
    Defun,
    Function,
    Var,
    Name,
    Num,
    Str,
    Binary,
    UnaryPrefix,
    UnaryPostfix,
    Sub,
    Dot,
    Assign,
    Call,
    New,
    Throw,
    Return,
    Label,
    Break,
    Continue,
    Debugger,
    If,
    Switch,
    Try,
    Do,
    While,
    For,
    ForIn,
    Seq,
    Conditional,
    Array,
    Object,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Toplevel => "toplevel",
            Kind::Block => "block",
            Kind::Stat => "stat",
            Kind::Defun => "defun",
            Kind::Function => "function",
            Kind::Var => "var",
            Kind::Name => "name",
            Kind::Num => "num",
            Kind::Str => "string",
            Kind::Binary => "binary",
            Kind::UnaryPrefix => "unary-prefix",
            Kind::UnaryPostfix => "unary-postfix",
            Kind::Sub => "sub",
            Kind::Dot => "dot",
            Kind::Assign => "assign",
            Kind::Call => "call",
            Kind::New => "new",
            Kind::Throw => "throw",
            Kind::Return => "return",
            Kind::Label => "label",
            Kind::Break => "break",
            Kind::Continue => "continue",
            Kind::Debugger => "debugger",
            Kind::If => "if",
            Kind::Switch => "switch",
            Kind::Try => "try",
            Kind::Do => "do",
            Kind::While => "while",
            Kind::For => "for",
            Kind::ForIn => "for-in",
            Kind::Seq => "seq",
            Kind::Conditional => "conditional",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a `var` statement. A missing initializer is synthesized to the
/// literal `undefined` by the variable scan, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub init: Option<Ast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the `default:` arm.
    pub test: Option<Ast>,
    pub body: Vec<Ast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: String,
    pub body: Vec<Ast>,
}

/// Abstract syntax of the generated-code dialect: one variant per kind tag.
/// String literals keep their raw source text (quotes included) so the printer
/// can re-emit them verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Toplevel(Vec<Ast>),
    Block(Vec<Ast>),
    Stat(Box<Ast>),
    Defun {
        name: String,
        args: Vec<String>,
        body: Vec<Ast>,
    },
    Function {
        name: Option<String>,
        args: Vec<String>,
        body: Vec<Ast>,
    },
    Var(Vec<VarDecl>),
    Name(String),
    Num(f64),
    Str(String),
    Binary {
        op: String,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    UnaryPrefix {
        op: String,
        expr: Box<Ast>,
    },
    UnaryPostfix {
        op: String,
        expr: Box<Ast>,
    },
    Sub {
        obj: Box<Ast>,
        index: Box<Ast>,
    },
    Dot {
        obj: Box<Ast>,
        prop: String,
    },
    Assign {
        /// `None` for plain `=`, otherwise the compound operator (`+` for `+=`).
        op: Option<String>,
        target: Box<Ast>,
        value: Box<Ast>,
    },
    Call {
        callee: Box<Ast>,
        args: Vec<Ast>,
    },
    New {
        callee: Box<Ast>,
        args: Vec<Ast>,
    },
    Throw(Box<Ast>),
    Return(Option<Box<Ast>>),
    Label {
        name: String,
        body: Box<Ast>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Debugger,
    If {
        cond: Box<Ast>,
        then: Box<Ast>,
        els: Option<Box<Ast>>,
    },
    Switch {
        disc: Box<Ast>,
        cases: Vec<SwitchCase>,
    },
    Try {
        body: Vec<Ast>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Ast>>,
    },
    Do {
        cond: Box<Ast>,
        body: Box<Ast>,
    },
    While {
        cond: Box<Ast>,
        body: Box<Ast>,
    },
    For {
        init: Option<Box<Ast>>,
        cond: Option<Box<Ast>>,
        step: Option<Box<Ast>>,
        body: Box<Ast>,
    },
    ForIn {
        decl: Box<Ast>,
        obj: Box<Ast>,
        body: Box<Ast>,
    },
    Seq(Box<Ast>, Box<Ast>),
    Conditional {
        cond: Box<Ast>,
        then: Box<Ast>,
        els: Box<Ast>,
    },
    Array(Vec<Ast>),
    /// Keys keep their raw source text, like strings.
    Object(Vec<(String, Ast)>),
}

impl Ast {
    pub fn kind(&self) -> Kind {
        match self {
            Ast::Toplevel(_) => Kind::Toplevel,
            Ast::Block(_) => Kind::Block,
            Ast::Stat(_) => Kind::Stat,
            Ast::Defun { .. } => Kind::Defun,
            Ast::Function { .. } => Kind::Function,
            Ast::Var(_) => Kind::Var,
            Ast::Name(_) => Kind::Name,
            Ast::Num(_) => Kind::Num,
            Ast::Str(_) => Kind::Str,
            Ast::Binary { .. } => Kind::Binary,
            Ast::UnaryPrefix { .. } => Kind::UnaryPrefix,
            Ast::UnaryPostfix { .. } => Kind::UnaryPostfix,
            Ast::Sub { .. } => Kind::Sub,
            Ast::Dot { .. } => Kind::Dot,
            Ast::Assign { .. } => Kind::Assign,
            Ast::Call { .. } => Kind::Call,
            Ast::New { .. } => Kind::New,
            Ast::Throw(_) => Kind::Throw,
            Ast::Return(_) => Kind::Return,
            Ast::Label { .. } => Kind::Label,
            Ast::Break(_) => Kind::Break,
            Ast::Continue(_) => Kind::Continue,
            Ast::Debugger => Kind::Debugger,
            Ast::If { .. } => Kind::If,
            Ast::Switch { .. } => Kind::Switch,
            Ast::Try { .. } => Kind::Try,
            Ast::Do { .. } => Kind::Do,
            Ast::While { .. } => Kind::While,
            Ast::For { .. } => Kind::For,
            Ast::ForIn { .. } => Kind::ForIn,
            Ast::Seq(..) => Kind::Seq,
            Ast::Conditional { .. } => Kind::Conditional,
            Ast::Array(_) => Kind::Array,
            Ast::Object(_) => Kind::Object,
        }
    }

    /// The no-op statement used where a whole `var` declaration was erased.
    pub fn empty() -> Ast {
        Ast::Toplevel(Vec::new())
    }

    pub fn undefined() -> Ast {
        Ast::Name("undefined".to_owned())
    }

    pub fn is_empty_placeholder(&self) -> bool {
        matches!(self, Ast::Toplevel(items) if items.is_empty())
    }

    /// Child slots in source order. `var` declaration names, argument lists,
    /// labels, property names and catch parameters are payload, not children.
    pub fn children(&self) -> Vec<&Ast> {
        let mut out: Vec<&Ast> = Vec::new();
        match self {
            Ast::Toplevel(items) | Ast::Block(items) | Ast::Array(items) => {
                out.extend(items.iter());
            }
            Ast::Stat(e) | Ast::Throw(e) | Ast::Label { body: e, .. } => out.push(e),
            Ast::Defun { body, .. } | Ast::Function { body, .. } => out.extend(body.iter()),
            Ast::Var(decls) => out.extend(decls.iter().filter_map(|d| d.init.as_ref())),
            Ast::Name(_)
            | Ast::Num(_)
            | Ast::Str(_)
            | Ast::Debugger
            | Ast::Break(_)
            | Ast::Continue(_) => {}
            Ast::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Ast::UnaryPrefix { expr, .. } | Ast::UnaryPostfix { expr, .. } => out.push(expr),
            Ast::Sub { obj, index } => {
                out.push(obj);
                out.push(index);
            }
            Ast::Dot { obj, .. } => out.push(obj),
            Ast::Assign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            Ast::Call { callee, args } | Ast::New { callee, args } => {
                out.push(callee);
                out.extend(args.iter());
            }
            Ast::Return(e) => out.extend(e.iter().map(|b| &**b)),
            Ast::If { cond, then, els } => {
                out.push(cond);
                out.push(then);
                out.extend(els.iter().map(|b| &**b));
            }
            Ast::Switch { disc, cases } => {
                out.push(disc);
                for case in cases {
                    out.extend(case.test.iter());
                    out.extend(case.body.iter());
                }
            }
            Ast::Try {
                body,
                catch,
                finally,
            } => {
                out.extend(body.iter());
                if let Some(c) = catch {
                    out.extend(c.body.iter());
                }
                if let Some(f) = finally {
                    out.extend(f.iter());
                }
            }
            Ast::Do { cond, body } | Ast::While { cond, body } => {
                out.push(cond);
                out.push(body);
            }
            Ast::For {
                init,
                cond,
                step,
                body,
            } => {
                out.extend([init, cond, step].into_iter().flatten().map(|b| &**b));
                out.push(body);
            }
            Ast::ForIn { decl, obj, body } => {
                out.push(decl);
                out.push(obj);
                out.push(body);
            }
            Ast::Seq(a, b) => {
                out.push(a);
                out.push(b);
            }
            Ast::Conditional { cond, then, els } => {
                out.push(cond);
                out.push(then);
                out.push(els);
            }
            Ast::Object(pairs) => out.extend(pairs.iter().map(|(_, v)| v)),
        }
        out
    }

    /// Mutable twin of [`Ast::children`], same order.
    pub fn children_mut(&mut self) -> Vec<&mut Ast> {
        let mut out: Vec<&mut Ast> = Vec::new();
        match self {
            Ast::Toplevel(items) | Ast::Block(items) | Ast::Array(items) => {
                out.extend(items.iter_mut());
            }
            Ast::Stat(e) | Ast::Throw(e) | Ast::Label { body: e, .. } => out.push(e),
            Ast::Defun { body, .. } | Ast::Function { body, .. } => out.extend(body.iter_mut()),
            Ast::Var(decls) => out.extend(decls.iter_mut().filter_map(|d| d.init.as_mut())),
            Ast::Name(_)
            | Ast::Num(_)
            | Ast::Str(_)
            | Ast::Debugger
            | Ast::Break(_)
            | Ast::Continue(_) => {}
            Ast::Binary { left, right, .. } => {
                out.push(left);
                out.push(right);
            }
            Ast::UnaryPrefix { expr, .. } | Ast::UnaryPostfix { expr, .. } => out.push(expr),
            Ast::Sub { obj, index } => {
                out.push(obj);
                out.push(index);
            }
            Ast::Dot { obj, .. } => out.push(obj),
            Ast::Assign { target, value, .. } => {
                out.push(target);
                out.push(value);
            }
            Ast::Call { callee, args } | Ast::New { callee, args } => {
                out.push(callee);
                out.extend(args.iter_mut());
            }
            Ast::Return(e) => out.extend(e.iter_mut().map(|b| &mut **b)),
            Ast::If { cond, then, els } => {
                out.push(cond);
                out.push(then);
                out.extend(els.iter_mut().map(|b| &mut **b));
            }
            Ast::Switch { disc, cases } => {
                out.push(disc);
                for case in cases {
                    out.extend(case.test.iter_mut());
                    out.extend(case.body.iter_mut());
                }
            }
            Ast::Try {
                body,
                catch,
                finally,
            } => {
                out.extend(body.iter_mut());
                if let Some(c) = catch {
                    out.extend(c.body.iter_mut());
                }
                if let Some(f) = finally {
                    out.extend(f.iter_mut());
                }
            }
            Ast::Do { cond, body } | Ast::While { cond, body } => {
                out.push(cond);
                out.push(body);
            }
            Ast::For {
                init,
                cond,
                step,
                body,
            } => {
                out.extend([init, cond, step].into_iter().flatten().map(|b| &mut **b));
                out.push(body);
            }
            Ast::ForIn { decl, obj, body } => {
                out.push(decl);
                out.push(obj);
                out.push(body);
            }
            Ast::Seq(a, b) => {
                out.push(a);
                out.push(b);
            }
            Ast::Conditional { cond, then, els } => {
                out.push(cond);
                out.push(then);
                out.push(els);
            }
            Ast::Object(pairs) => out.extend(pairs.iter_mut().map(|(_, v)| v)),
        }
        out
    }
}

#[test]
fn kind_tags_round_trip_names() {
    assert_eq!(Ast::undefined().kind(), Kind::Name);
    assert_eq!(Kind::UnaryPrefix.name(), "unary-prefix");
    assert_eq!(Kind::ForIn.name(), "for-in");
    assert_eq!(Ast::empty().kind().name(), "toplevel");
}

#[test]
fn children_follow_slot_order() {
    let node = Ast::Binary {
        op: "+".to_owned(),
        left: Box::new(Ast::Name("x".to_owned())),
        right: Box::new(Ast::Num(1.0)),
    };
    let kids = node.children();
    assert_eq!(kids.len(), 2);
    assert_eq!(kids[0].kind(), Kind::Name);
    assert_eq!(kids[1].kind(), Kind::Num);
}

#[test]
fn var_children_are_initializers_only() {
    let node = Ast::Var(vec![
        VarDecl {
            name: "a".to_owned(),
            init: Some(Ast::Num(1.0)),
        },
        VarDecl {
            name: "b".to_owned(),
            init: None,
        },
    ]);
    assert_eq!(node.children().len(), 1);
}
