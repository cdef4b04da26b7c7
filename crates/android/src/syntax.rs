//! Syntax tree produced by the parser

use crate::error::Location;

/// A statement inside a block or at the top level
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name { ... }` or `name("label") { ... }`
    Block(Block),
    /// `a.b = value`
    Assign(Assign),
    /// `val name = value`
    Val(Val),
    /// A bare expression, usually a call such as `id("...")`
    Expr(Expr),
}

impl Stmt {
    pub fn location(&self) -> Location {
        match self {
            Stmt::Block(b) => b.location,
            Stmt::Assign(a) => a.location,
            Stmt::Val(v) => v.location,
            Stmt::Expr(e) => e.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Dotted block name, e.g. `android` or `buildTypes`
    pub name: String,
    /// Arguments of a call-style header such as `create("release")`
    pub args: Vec<Arg>,
    pub body: Vec<Stmt>,
    pub location: Location,
}

impl Block {
    /// First argument, when it is a string literal
    pub fn label(&self) -> Option<&str> {
        match self.args.first().map(|a| &a.value.kind) {
            Some(ExprKind::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Vec<String>,
    pub value: Expr,
    pub location: Location,
}

impl Assign {
    /// Assignment target as written, e.g. `minSdk` or `android.namespace`
    pub fn target_name(&self) -> String {
        self.target.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    pub name: String,
    pub value: Expr,
    pub location: Location,
}

/// Call argument, optionally named (`group = "..."`)
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Str(String),
    Int(i64),
    Bool(bool),
    /// `a.b.c`
    Path(Vec<String>),
    /// `callee(args)`
    Call { callee: Box<Expr>, args: Vec<Arg> },
    /// `target.name` where `target` is not a plain path
    Member { target: Box<Expr>, name: String },
    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
    /// `lhs op rhs`, e.g. `id("x") version "1.0"` or `value as String`
    Infix { lhs: Box<Expr>, op: String, rhs: Box<Expr> },
}

impl Expr {
    /// Dotted path segments when this is a plain path
    pub fn as_path(&self) -> Option<&[String]> {
        match &self.kind {
            ExprKind::Path(segments) => Some(segments),
            _ => None,
        }
    }

    /// Callee path and arguments when this is a call on a plain path
    pub fn as_path_call(&self) -> Option<(&[String], &[Arg])> {
        match &self.kind {
            ExprKind::Call { callee, args } => callee.as_path().map(|p| (p, args.as_slice())),
            _ => None,
        }
    }
}
